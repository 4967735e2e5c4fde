pub mod config;
pub mod ledger_entry;
pub mod quant_metrics;
pub mod render;
pub mod run_record;
pub mod ticker_result;

pub use config::{
    AgentsConfig, ArchiveConfig, AutohedgeConfig, MarketDataConfig, RunConfig, TickerConcurrency,
};
pub use ledger_entry::{LedgerEntry, Role};
pub use quant_metrics::{KeyLevels, QuantMetrics};
pub use render::{OutputMode, RenderedLedger, RoleContent};
pub use run_record::{RunRecord, RunStatus};
pub use ticker_result::PerTickerResult;
