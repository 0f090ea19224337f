use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display bucket for a server-defined job status token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Error,
    #[serde(rename = "info", alias = "in_progress")]
    InProgress,
    Unknown,
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Success => write!(f, "success"),
            StatusClass::Error => write!(f, "error"),
            StatusClass::InProgress => write!(f, "info"),
            StatusClass::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for StatusClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(StatusClass::Success),
            "error" => Ok(StatusClass::Error),
            "info" | "in_progress" | "in-progress" => Ok(StatusClass::InProgress),
            "unknown" => Ok(StatusClass::Unknown),
            other => Err(format!("unknown status class: {other}")),
        }
    }
}

/// Tokens the backend is known to emit.
const DEFAULT_TOKENS: &[(&str, StatusClass)] = &[
    ("completed", StatusClass::Success),
    ("success", StatusClass::Success),
    ("done", StatusClass::Success),
    ("passed", StatusClass::Success),
    ("failed", StatusClass::Error),
    ("error", StatusClass::Error),
    ("running", StatusClass::InProgress),
    ("in_progress", StatusClass::InProgress),
    ("generating", StatusClass::InProgress),
    ("executing", StatusClass::InProgress),
    ("queued", StatusClass::InProgress),
];

/// Token → display bucket lookup.
///
/// The server's status vocabulary is open-ended, so the mapping is a plain
/// table that configuration can extend rather than anything inferred.
/// Lookups are case-insensitive; unlisted tokens are [`StatusClass::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTable {
    entries: HashMap<String, StatusClass>,
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TOKENS
                .iter()
                .map(|&(token, class)| (token.to_string(), class))
                .collect(),
        }
    }
}

impl StatusTable {
    /// Adds or replaces a mapping.
    pub fn with(mut self, token: &str, class: StatusClass) -> Self {
        self.insert(token, class);
        self
    }

    pub fn insert(&mut self, token: &str, class: StatusClass) {
        self.entries.insert(token.trim().to_ascii_lowercase(), class);
    }

    pub fn classify(&self, status: &str) -> StatusClass {
        self.entries
            .get(&status.trim().to_ascii_lowercase())
            .copied()
            .unwrap_or(StatusClass::Unknown)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
