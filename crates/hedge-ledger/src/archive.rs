use chrono::{DateTime, Utc};
use hedge_models::run_record::RUN_ARCHIVE_DDL;
use hedge_models::{LedgerEntry, Role, RunRecord};
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::LedgerError;

/// Summary row for a stored run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedRun {
    pub id: Uuid,
    pub name: String,
    pub task: String,
    pub tickers: Vec<String>,
    pub status: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// SQLite history of finished runs and their ledgers.
///
/// Failed runs are stored too, with whatever ledger they accumulated.
pub struct RunArchive {
    conn: Connection,
}

impl RunArchive {
    /// Open (or create) the archive database. Enables WAL mode.
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(RUN_ARCHIVE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory archive for testing.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(RUN_ARCHIVE_DDL)?;
        Ok(Self { conn })
    }

    /// Store a run and its ledger entries in one transaction.
    pub fn record(&mut self, record: &RunRecord) -> Result<(), LedgerError> {
        let tickers_json = serde_json::to_string(&record.tickers)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO runs \
             (id, name, task, tickers_json, status, error, started_at, finished_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                record.id.to_string(),
                record.name,
                record.task,
                tickers_json,
                record.status.as_str(),
                record.error,
                record.started_at.to_rfc3339(),
                record.finished_at.to_rfc3339(),
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO ledger_entries (run_id, seq, role, ticker, content, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (seq, entry) in record.entries.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    record.id.to_string(),
                    seq as i64,
                    entry.role.as_str(),
                    entry.ticker,
                    entry.content,
                    entry.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(run_id = %record.id, entries = record.entries.len(), "Archived run");
        Ok(())
    }

    /// Most recent distinct tasks, newest first.
    pub fn recent_tasks(&self, limit: usize) -> Result<Vec<String>, LedgerError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT task, MAX(started_at) AS last_run FROM runs \
             GROUP BY task ORDER BY last_run DESC LIMIT ?1",
        )?;
        let tasks = stmt
            .query_map(rusqlite::params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Most recent runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<ArchivedRun>, LedgerError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, task, tickers_json, status, error, started_at, finished_at \
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, name, task, tickers_json, status, error, started_at, finished_at)| {
                    Ok(ArchivedRun {
                        id: Uuid::parse_str(&id)
                            .map_err(|e| LedgerError::Corrupt(format!("run id {id}: {e}")))?,
                        name,
                        task,
                        tickers: serde_json::from_str(&tickers_json)?,
                        status,
                        error,
                        started_at: parse_timestamp(&started_at)?,
                        finished_at: parse_timestamp(&finished_at)?,
                    })
                },
            )
            .collect()
    }

    /// Ledger entries of a run, in append order.
    pub fn entries(&self, run_id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT role, ticker, content, timestamp FROM ledger_entries \
             WHERE run_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![run_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(role, ticker, content, timestamp)| {
                let role = Role::from_name(&role)
                    .ok_or_else(|| LedgerError::Corrupt(format!("unknown role: {role}")))?;
                Ok(LedgerEntry {
                    role,
                    content,
                    timestamp: parse_timestamp(&timestamp)?,
                    ticker,
                })
            })
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Corrupt(format!("timestamp {raw}: {e}")))
}
