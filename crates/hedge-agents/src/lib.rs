pub mod adapters;
pub mod claude_cli;
pub mod error;
pub mod market_data;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod stage;

pub mod test_support;

pub use adapters::{Director, ExecutionAgent, QuantAnalyst, RiskManager};
pub use error::{
    AdapterError, DataUnavailableError, ParseError, PipelineError, RunError, StageError,
};
pub use market_data::{HttpMarketData, MarketDataGateway};
pub use parser::{JsonObject, OutputValidator, QuantMetricsCheck, TypedJson};
pub use pipeline::{Pipeline, PipelineStages, RunOutcome};
pub use stage::{ClaudeStage, ReasoningStage};
