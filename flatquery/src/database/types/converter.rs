//! Backend identifier and helpers shared by the per-driver converters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Database backend identifier
///
/// `MySQL` is the full dialect (online `ALTER TABLE` for keys, indexes and
/// fulltext). `SQLite` is the restricted, embedded-file dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[serde(alias = "mariadb")]
    MySQL,
    #[serde(alias = "sqlite3")]
    SQLite,
}

impl DatabaseBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseBackend::MySQL => "MySQL",
            DatabaseBackend::SQLite => "SQLite",
        }
    }

    /// Whether structural changes after creation are mostly forbidden
    pub fn is_restricted(&self) -> bool {
        matches!(self, DatabaseBackend::SQLite)
    }

    /// Detect the backend from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(DatabaseBackend::MySQL)
        } else if lower.starts_with("sqlite:") {
            Some(DatabaseBackend::SQLite)
        } else {
            None
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatabaseBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseBackend::MySQL),
            "sqlite" | "sqlite3" => Ok(DatabaseBackend::SQLite),
            other => Err(Error::config(format!("Unknown database engine '{}'", other))),
        }
    }
}

/// Finite floats become JSON numbers, NaN and infinities become null
pub(crate) fn json_float(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
