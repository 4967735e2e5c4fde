use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The actor that produced a ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "Trading-Director")]
    Director,
    #[serde(rename = "Quant-Analyst")]
    Quant,
    #[serde(rename = "Risk-Manager")]
    Risk,
    #[serde(rename = "Execution-Agent")]
    Execution,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Director => "Trading-Director",
            Role::Quant => "Quant-Analyst",
            Role::Risk => "Risk-Manager",
            Role::Execution => "Execution-Agent",
        }
    }

    pub fn from_name(name: &str) -> Option<Role> {
        match name {
            "user" => Some(Role::User),
            "Trading-Director" => Some(Role::Director),
            "Quant-Analyst" => Some(Role::Quant),
            "Risk-Manager" => Some(Role::Risk),
            "Execution-Agent" => Some(Role::Execution),
            _ => None,
        }
    }

    /// The four roles backed by a reasoning stage.
    pub fn stages() -> [Role; 4] {
        [Role::Director, Role::Quant, Role::Risk, Role::Execution]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the conversation ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set when tickers are processed concurrently so interleaved entries stay attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

impl LedgerEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            ticker: None,
        }
    }

    /// `"{role}: {content}"`, the line used by the string rendering.
    pub fn as_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}
