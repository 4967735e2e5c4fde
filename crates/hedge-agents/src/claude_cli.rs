use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::StageError;

const CLAUDE_BIN: &str = "claude";

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Arguments for a print-mode call. The user prompt goes on stdin, not argv:
/// market data payloads can exceed the per-argument size limit.
pub fn cli_args(system_prompt: &str, config: &ClaudeCliConfig) -> Vec<String> {
    vec![
        "-p".to_string(),
        "--system-prompt".to_string(),
        system_prompt.to_string(),
        "--model".to_string(),
        config.model.clone(),
        "--output-format".to_string(),
        "text".to_string(),
    ]
}

/// Run `claude -p` with `user_prompt` on stdin and return its stdout.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, StageError> {
    let started = Instant::now();
    debug!(model = %config.model, prompt_len = user_prompt.len(), "Invoking claude CLI");

    let mut child = Command::new(CLAUDE_BIN)
        .args(cli_args(system_prompt, config))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StageError::Unavailable(format!("Failed to spawn {CLAUDE_BIN}: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| StageError::Unavailable("claude stdin not captured".to_string()))?;

    let run = async move {
        stdin.write_all(user_prompt.as_bytes()).await?;
        // Closing stdin ends the prompt.
        drop(stdin);
        let output = child.wait_with_output().await?;
        Ok::<_, std::io::Error>(output)
    };

    let output = tokio::time::timeout(config.timeout, run)
        .await
        .map_err(|_| StageError::Timeout(config.timeout.as_secs()))?
        .map_err(|e| StageError::Cli(format!("claude I/O failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr.trim(), "Claude CLI failed");
        return Err(StageError::Cli(format!(
            "claude exited {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(StageError::EmptyResponse);
    }

    debug!(
        model = %config.model,
        output_len = stdout.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Claude CLI returned"
    );
    Ok(stdout)
}

/// Whether `claude --version` runs successfully.
pub async fn check_cli_available() -> bool {
    Command::new(CLAUDE_BIN)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
