use std::path::{Path, PathBuf};

use hedge_models::RunRecord;

use crate::error::LedgerError;

/// File name for a run report: `{name}-{id}.json`, with path separators in the name replaced.
pub fn report_file_name(record: &RunRecord) -> String {
    let name: String = record
        .name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{name}-{}.json", record.id.simple())
}

/// Write a run as pretty JSON into `dir`, creating the directory if needed.
pub fn write_report(dir: &Path, record: &RunRecord) -> Result<PathBuf, LedgerError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(record));
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json)?;
    tracing::info!(path = %path.display(), run_id = %record.id, "Wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hedge_models::{LedgerEntry, Role, RunStatus};
    use uuid::Uuid;

    fn record(name: &str) -> RunRecord {
        RunRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: "test fund".to_string(),
            task: "Analyze AAPL".to_string(),
            tickers: vec!["AAPL".to_string()],
            status: RunStatus::Completed,
            error: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: vec![],
            entries: vec![LedgerEntry::new(Role::User, "Task: Analyze AAPL")],
        }
    }

    #[test]
    fn writes_report_into_new_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("outputs");
        let record = record("swarms-fund");

        let path = write_report(&dir, &record).unwrap();
        assert!(path.starts_with(&dir));

        let written: RunRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, record);
    }

    #[test]
    fn file_name_strips_separators() {
        let record = record("desk/alpha");
        let name = report_file_name(&record);
        assert!(name.starts_with("desk_alpha-"));
        assert!(name.ends_with(".json"));
    }
}
