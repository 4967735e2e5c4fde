//! AutoHedge - a multi-agent trading pipeline
//!
//! A task runs through a trading director, quant analyst, risk manager and
//! execution agent for each ticker; every contribution lands in one
//! append-only ledger.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use autohedge::models::AutohedgeConfig;
//! use autohedge::agents::{Pipeline, PipelineStages, ReasoningStage, MarketDataGateway};
//! use autohedge::ledger::{Ledger, RunArchive};
//! ```

pub use hedge_agents as agents;
pub use hedge_ledger as ledger;
pub use hedge_models as models;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hedge_agents::{
    ClaudeStage, Director, ExecutionAgent, HttpMarketData, MarketDataGateway, Pipeline,
    PipelineStages, QuantAnalyst, ReasoningStage, RiskManager, RunError, RunOutcome,
};
use hedge_ledger::{write_report, ArchivedRun, RunArchive};
use hedge_models::{AutohedgeConfig, RenderedLedger, Role, RunRecord};
use tracing::{info, warn};

/// Read and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<AutohedgeConfig, anyhow::Error> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// The Claude stage for `role`, on the model configured for it.
pub fn role_stage(config: &AutohedgeConfig, role: Role) -> ClaudeStage {
    ClaudeStage::for_role(
        role,
        config.agents.model_for(role).to_string(),
        Duration::from_secs(config.agents.stage_timeout_seconds),
    )
}

/// Claude-backed stages for every role, sharing one market data gateway.
pub fn build_stages(
    config: &AutohedgeConfig,
    market_data: Arc<dyn MarketDataGateway>,
) -> PipelineStages {
    let stage = |role: Role| -> Arc<dyn ReasoningStage> { Arc::new(role_stage(config, role)) };

    PipelineStages {
        director: Director::new(stage(Role::Director), market_data),
        quant: QuantAnalyst::new(stage(Role::Quant)),
        risk: RiskManager::new(stage(Role::Risk)),
        execution: ExecutionAgent::new(stage(Role::Execution)),
    }
}

/// Build a Pipeline from configuration.
pub fn build_pipeline(config: &AutohedgeConfig) -> Result<Pipeline, anyhow::Error> {
    let market_data = HttpMarketData::from_env(&config.market_data)
        .context("Failed to build market data client")?;
    let stages = build_stages(config, Arc::new(market_data));
    Ok(Pipeline::new(stages, config.run.clone()))
}

/// Runs tasks and persists every run, successful or not.
///
/// Persistence is best effort: a report or archive failure is logged and
/// never replaces the run's own result.
pub struct TaskRunner {
    pipeline: Pipeline,
    archive: Option<RunArchive>,
    last_report: Option<PathBuf>,
}

impl TaskRunner {
    pub fn new(pipeline: Pipeline, archive: Option<RunArchive>) -> Self {
        Self {
            pipeline,
            archive,
            last_report: None,
        }
    }

    pub fn from_config(config: &AutohedgeConfig) -> Result<Self, anyhow::Error> {
        let pipeline = build_pipeline(config)?;
        let archive = if config.archive.enabled {
            if let Some(parent) = Path::new(&config.archive.sqlite_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create archive directory: {}", parent.display())
                    })?;
                }
            }
            let archive = RunArchive::open(&config.archive.sqlite_path).with_context(|| {
                format!("Failed to open run archive: {}", config.archive.sqlite_path)
            })?;
            Some(archive)
        } else {
            None
        };
        Ok(Self::new(pipeline, archive))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Path of the report written for the most recent run, if any.
    pub fn last_report(&self) -> Option<&Path> {
        self.last_report.as_deref()
    }

    pub async fn run(&mut self, task: &str) -> Result<RunOutcome, RunError> {
        let result = self.pipeline.run(task).await;
        let record = match &result {
            Ok(outcome) => outcome.to_record(),
            Err(err) => err.to_record(self.pipeline.settings()),
        };
        self.persist(&record);
        result
    }

    fn persist(&mut self, record: &RunRecord) {
        self.last_report = None;
        let settings = self.pipeline.settings();
        if settings.save_report {
            match write_report(Path::new(&settings.output_dir), record) {
                Ok(path) => self.last_report = Some(path),
                Err(e) => warn!(run_id = %record.id, error = %e, "Failed to write run report"),
            }
        }
        if let Some(archive) = self.archive.as_mut() {
            match archive.record(record) {
                Ok(()) => {
                    info!(run_id = %record.id, status = record.status.as_str(), "Run archived")
                }
                Err(e) => warn!(run_id = %record.id, error = %e, "Failed to archive run"),
            }
        }
    }

    /// Most recent distinct tasks, newest first. Empty without an archive.
    pub fn recent_tasks(&self, limit: usize) -> Result<Vec<String>, anyhow::Error> {
        match &self.archive {
            Some(archive) => Ok(archive.recent_tasks(limit)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<ArchivedRun>, anyhow::Error> {
        match &self.archive {
            Some(archive) => Ok(archive.recent_runs(limit)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Text for stdout: `str` mode prints as-is, the others as JSON.
pub fn render_output(output: &RenderedLedger, pretty: bool) -> Result<String, serde_json::Error> {
    match output {
        RenderedLedger::Str(text) => Ok(text.clone()),
        other if pretty => serde_json::to_string_pretty(other),
        other => serde_json::to_string(other),
    }
}

pub const REPL_HELP: &str = "\
Type a trading task and press enter, for example:
  Analyze NVDA for a 50k allocation
  Compare AAPL and MSFT for a swing trade

Commands:
  history         show recent tasks
  help, ?, h      show this message
  quit, exit, q   leave";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    History,
    Empty,
    Task(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" => ReplCommand::Empty,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "help" | "?" | "h" => ReplCommand::Help,
            "history" => ReplCommand::History,
            _ => ReplCommand::Task(line.to_string()),
        }
    }
}
