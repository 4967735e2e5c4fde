use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ledger_entry::{LedgerEntry, Role};

/// How a run's ledger is handed back to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Full entries, timestamps included.
    #[default]
    List,
    /// `{role, content}` pairs.
    Dict,
    /// One string, `"{role}: {content}"` per entry.
    Str,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(OutputMode::List),
            "dict" => Ok(OutputMode::Dict),
            "str" => Ok(OutputMode::Str),
            other => Err(format!(
                "unknown output mode '{other}' (expected list, dict or str)"
            )),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputMode::List => "list",
            OutputMode::Dict => "dict",
            OutputMode::Str => "str",
        };
        f.write_str(s)
    }
}

/// The dict projection of a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleContent {
    pub role: Role,
    pub content: String,
}

impl From<&LedgerEntry> for RoleContent {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.content.clone(),
        }
    }
}

/// A ledger rendered in one of the three output modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RenderedLedger {
    List(Vec<LedgerEntry>),
    Dict(Vec<RoleContent>),
    Str(String),
}

impl RenderedLedger {
    pub fn mode(&self) -> OutputMode {
        match self {
            RenderedLedger::List(_) => OutputMode::List,
            RenderedLedger::Dict(_) => OutputMode::Dict,
            RenderedLedger::Str(_) => OutputMode::Str,
        }
    }
}
