use std::sync::{Arc, Mutex, MutexGuard};

use hedge_models::{LedgerEntry, OutputMode, RenderedLedger, Role, RoleContent};

/// Separator between entries in the string rendering.
pub const LINE_SEPARATOR: &str = "\n\n";

/// Append-only conversation log shared by every stage of a run.
///
/// Entries are never removed, reordered or edited; the only mutators are
/// [`Ledger::append`] and [`Ledger::append_for`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &LedgerEntry {
        self.push(LedgerEntry::new(role, content))
    }

    /// Append an entry attributed to a ticker.
    pub fn append_for(
        &mut self,
        role: Role,
        ticker: &str,
        content: impl Into<String>,
    ) -> &LedgerEntry {
        let mut entry = LedgerEntry::new(role, content);
        entry.ticker = Some(ticker.to_string());
        self.push(entry)
    }

    fn push(&mut self, entry: LedgerEntry) -> &LedgerEntry {
        let idx = self.entries.len();
        self.entries.push(entry);
        &self.entries[idx]
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.entries.iter().map(|e| e.role).collect()
    }

    pub fn to_list(&self) -> Vec<LedgerEntry> {
        self.snapshot()
    }

    pub fn to_dict(&self) -> Vec<RoleContent> {
        self.entries.iter().map(RoleContent::from).collect()
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(LedgerEntry::as_line)
            .collect::<Vec<_>>()
            .join(LINE_SEPARATOR)
    }

    pub fn render(&self, mode: OutputMode) -> RenderedLedger {
        match mode {
            OutputMode::List => RenderedLedger::List(self.to_list()),
            OutputMode::Dict => RenderedLedger::Dict(self.to_dict()),
            OutputMode::Str => RenderedLedger::Str(self.to_text()),
        }
    }
}

impl From<Vec<LedgerEntry>> for Ledger {
    fn from(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }
}

/// A ledger behind a mutex, for runs that process tickers concurrently.
///
/// The lock is held only for the duration of a push, never across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    // A panic while holding the lock cannot leave a half-pushed entry, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, role: Role, content: impl Into<String>) {
        self.lock().append(role, content);
    }

    pub fn append_for(&self, role: Role, ticker: &str, content: impl Into<String>) {
        self.lock().append_for(role, ticker, content);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().clone()
    }
}
