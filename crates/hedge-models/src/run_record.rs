use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger_entry::LedgerEntry;
use crate::ticker_result::PerTickerResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// What gets persisted about a run, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub task: String,
    pub tickers: Vec<String>,
    pub status: RunStatus,
    /// Error message for failed runs.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-ticker results in processing order. Partial for failed runs.
    pub results: Vec<PerTickerResult>,
    /// Ledger entries in append order. Partial for failed runs.
    pub entries: Vec<LedgerEntry>,
}

/// SQLite schema for the run archive.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS runs (
///     id           TEXT PRIMARY KEY,
///     name         TEXT NOT NULL,
///     task         TEXT NOT NULL,
///     tickers_json TEXT NOT NULL,
///     status       TEXT NOT NULL,
///     error        TEXT,
///     started_at   TEXT NOT NULL,
///     finished_at  TEXT NOT NULL
/// );
///
/// CREATE TABLE IF NOT EXISTS ledger_entries (
///     run_id    TEXT NOT NULL REFERENCES runs(id),
///     seq       INTEGER NOT NULL,
///     role      TEXT NOT NULL,
///     ticker    TEXT,
///     content   TEXT NOT NULL,
///     timestamp TEXT NOT NULL,
///     PRIMARY KEY (run_id, seq)
/// );
/// ```
pub const RUN_ARCHIVE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS runs (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    task         TEXT NOT NULL,
    tickers_json TEXT NOT NULL,
    status       TEXT NOT NULL,
    error        TEXT,
    started_at   TEXT NOT NULL,
    finished_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ledger_entries (
    run_id    TEXT NOT NULL REFERENCES runs(id),
    seq       INTEGER NOT NULL,
    role      TEXT NOT NULL,
    ticker    TEXT,
    content   TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (run_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
";
