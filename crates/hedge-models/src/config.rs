use serde::{Deserialize, Serialize};

use crate::ledger_entry::Role;
use crate::render::OutputMode;

/// Top-level configuration for autohedge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AutohedgeConfig {
    pub run: RunConfig,
    pub agents: AgentsConfig,
    pub market_data: MarketDataConfig,
    pub archive: ArchiveConfig,
}

/// How tickers within one run are scheduled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TickerConcurrency {
    /// One ticker at a time, in input order.
    #[default]
    Sequential,
    /// One task per ticker. Ledger entries are tagged with their ticker.
    PerTicker,
}

/// Settings fixed at run construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub description: String,
    /// Where run reports are written. Not read by the pipeline itself.
    pub output_dir: String,
    pub output_mode: OutputMode,
    /// Tickers to analyze. Empty means the director picks them from the task.
    pub tickers: Vec<String>,
    pub concurrency: TickerConcurrency,
    /// Write a JSON report into `output_dir` after each run.
    pub save_report: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "autohedge".to_string(),
            description: "fully autonomous hedgefund".to_string(),
            output_dir: "outputs".to_string(),
            output_mode: OutputMode::List,
            tickers: Vec::new(),
            concurrency: TickerConcurrency::Sequential,
            save_report: true,
        }
    }
}

/// Configuration for the reasoning stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-invocation timeout in seconds.
    pub stage_timeout_seconds: u64,
    /// Model used by every stage without an override.
    pub default_model: String,
    pub director_model: Option<String>,
    pub quant_model: Option<String>,
    pub risk_model: Option<String>,
    pub execution_model: Option<String>,
}

impl AgentsConfig {
    /// Model for a stage role, falling back to `default_model`.
    pub fn model_for(&self, role: Role) -> &str {
        let override_model = match role {
            Role::Director => self.director_model.as_deref(),
            Role::Quant => self.quant_model.as_deref(),
            Role::Risk => self.risk_model.as_deref(),
            Role::Execution => self.execution_model.as_deref(),
            Role::User => None,
        };
        override_model.unwrap_or(&self.default_model)
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            stage_timeout_seconds: 120,
            default_model: "claude-sonnet-4-5-20250929".to_string(),
            director_model: None,
            quant_model: None,
            risk_model: None,
            execution_model: None,
        }
    }
}

/// Configuration for the HTTP market data gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    /// Days of daily OHLC history to include.
    pub history_days: u32,
    pub include_balance_sheets: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.massive.com".to_string(),
            api_key_env: "POLYGON_API_KEY".to_string(),
            timeout_seconds: 15,
            history_days: 30,
            include_balance_sheets: true,
        }
    }
}

/// Configuration for the SQLite run archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub sqlite_path: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sqlite_path: "outputs/autohedge.db".to_string(),
        }
    }
}
