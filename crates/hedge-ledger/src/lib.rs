pub mod archive;
pub mod error;
pub mod ledger;
pub mod report;

pub use archive::{ArchivedRun, RunArchive};
pub use error::LedgerError;
pub use ledger::{Ledger, SharedLedger};
pub use report::write_report;
