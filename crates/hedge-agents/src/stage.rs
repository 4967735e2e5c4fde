use async_trait::async_trait;
use hedge_models::Role;

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::StageError;
use crate::prompts::system_prompt;

/// Text-in/text-out reasoning capability behind one pipeline role. Mockable for testing.
///
/// Each call is independent; any memory a backend keeps is private to it.
#[async_trait]
pub trait ReasoningStage: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: &str) -> Result<String, StageError>;
}

/// A reasoning stage that invokes the Claude CLI with a role system prompt.
pub struct ClaudeStage {
    pub name: String,
    pub system_prompt: String,
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeStage {
    pub fn new(name: String, system_prompt: String, model: String, timeout: std::time::Duration) -> Self {
        Self {
            name,
            system_prompt,
            cli_config: ClaudeCliConfig { model, timeout },
        }
    }

    /// A stage for one of the pipeline roles, using that role's system prompt.
    pub fn for_role(role: Role, model: String, timeout: std::time::Duration) -> Self {
        Self::new(
            role.as_str().to_string(),
            system_prompt(role).to_string(),
            model,
            timeout,
        )
    }
}

#[async_trait]
impl ReasoningStage for ClaudeStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<String, StageError> {
        invoke_claude(&self.system_prompt, prompt, &self.cli_config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn role_stage_uses_role_prompt() {
        let stage = ClaudeStage::for_role(
            Role::Risk,
            "claude-3-5-haiku-latest".to_string(),
            Duration::from_secs(30),
        );
        assert_eq!(stage.name(), "Risk-Manager");
        assert_eq!(stage.system_prompt, system_prompt(Role::Risk));
        assert_eq!(stage.cli_config.model, "claude-3-5-haiku-latest");
        assert_eq!(stage.cli_config.timeout, Duration::from_secs(30));
    }
}
