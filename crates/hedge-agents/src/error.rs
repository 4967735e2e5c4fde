use chrono::{DateTime, Utc};
use hedge_ledger::Ledger;
use hedge_models::{PerTickerResult, Role};
use thiserror::Error;
use uuid::Uuid;

/// A reasoning stage invocation failed.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Stage timed out after {0} seconds")]
    Timeout(u64),

    #[error("Stage returned an empty response")]
    EmptyResponse,

    #[error("Stage unavailable: {0}")]
    Unavailable(String),
}

/// The market data gateway could not produce data for a ticker.
#[derive(Error, Debug)]
pub enum DataUnavailableError {
    #[error("Ticker is empty")]
    EmptyTicker,

    #[error("Market data request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Market data API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Market data response could not be decoded: {0}")]
    Decode(String),

    #[error("No market data for {0}")]
    NotFound(String),

    #[error("Invalid market data base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Stage output did not have the shape a validator asked for.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("No valid JSON found in response (length={0})")]
    NoJson(usize),

    #[error("Response does not match expected shape: {0}")]
    Shape(String),

    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Failure of a single adapter operation, before the pipeline attaches role and ticker.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Data(#[from] DataUnavailableError),

    #[error(transparent)]
    Malformed(#[from] ParseError),
}

/// Why a run was aborted.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{role} stage failed for {ticker}: {source}")]
    Stage {
        role: Role,
        ticker: String,
        #[source]
        source: StageError,
    },

    #[error("Market data unavailable for {ticker}: {source}")]
    DataUnavailable {
        ticker: String,
        #[source]
        source: DataUnavailableError,
    },

    #[error("{role} returned malformed output for {ticker}: {source}")]
    MalformedOutput {
        role: Role,
        ticker: String,
        #[source]
        source: ParseError,
    },

    #[error("Ticker discovery failed: {0}")]
    Discovery(#[source] AdapterError),

    #[error("No tickers to analyze")]
    NoTickers,

    #[error("Run cancelled")]
    Cancelled,

    #[error("Ticker task failed: {0}")]
    Join(String),
}

impl PipelineError {
    /// Attach role and ticker to an adapter failure.
    pub fn from_adapter(role: Role, ticker: &str, err: AdapterError) -> Self {
        let ticker = ticker.to_string();
        match err {
            AdapterError::Stage(source) => PipelineError::Stage {
                role,
                ticker,
                source,
            },
            AdapterError::Data(source) => PipelineError::DataUnavailable { ticker, source },
            AdapterError::Malformed(source) => PipelineError::MalformedOutput {
                role,
                ticker,
                source,
            },
        }
    }

    /// Ticker being processed when the run failed, if any.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            PipelineError::Stage { ticker, .. }
            | PipelineError::DataUnavailable { ticker, .. }
            | PipelineError::MalformedOutput { ticker, .. } => Some(ticker),
            _ => None,
        }
    }
}

/// A failed run, with the audit trail it accumulated before aborting.
#[derive(Error, Debug)]
#[error("Run {run_id} failed: {error}")]
pub struct RunError {
    pub run_id: Uuid,
    pub task: String,
    /// Tickers the run set out to process, when known.
    pub tickers: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[source]
    pub error: PipelineError,
    /// Every entry appended before the failure.
    pub ledger: Ledger,
    /// Results for tickers finished before the failure.
    pub completed: Vec<PerTickerResult>,
}
