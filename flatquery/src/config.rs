//! Connection configuration
//!
//! A `ConnectionConfig` can be built in code, read from a TOML file (either
//! top-level keys or a `[database]` table) or taken from the environment:
//!
//! - `FLATQUERY_DATABASE_URL` (falls back to `DATABASE_URL`)
//! - `FLATQUERY_DB_ENGINE` to force `mysql` or `sqlite` regardless of the URL scheme
//! - `FLATQUERY_TABLE_ENGINE` for the storage engine used by `CREATE TABLE` on MySQL
//! - `FLATQUERY_DEBUG` to log every statement at info level

use crate::database::types::DatabaseBackend;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
#[cfg(feature = "config")]
use std::{fs, path::Path};

/// Configuration for a single connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database connection URL (required)
    pub url: String,

    /// Force the dialect instead of detecting it from the URL scheme
    #[serde(default)]
    pub engine: Option<DatabaseBackend>,

    /// Storage engine for tables created on MySQL
    #[serde(default = "default_table_engine")]
    pub table_engine: String,

    /// Create the SQLite file when it does not exist
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,

    /// Log every statement at info level, as if each spec had `debug` set
    #[serde(default)]
    pub debug: bool,
}

fn default_table_engine() -> String {
    "InnoDB".to_string()
}

fn default_create_if_missing() -> bool {
    true
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            engine: None,
            table_engine: default_table_engine(),
            create_if_missing: default_create_if_missing(),
            debug: false,
        }
    }

    /// In-memory SQLite database, mostly for tests
    pub fn sqlite_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Dialect of this connection: the explicit engine, else the URL scheme
    pub fn backend(&self) -> Result<DatabaseBackend> {
        if let Some(engine) = self.engine {
            return Ok(engine);
        }
        DatabaseBackend::from_url(&self.url).ok_or_else(|| {
            Error::config(format!(
                "Cannot detect database engine from URL '{}'. Use a mysql:// or sqlite: URL, \
                 or set the engine explicitly.",
                self.masked_url()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("Database URL cannot be empty"));
        }
        self.backend().map(|_| ())
    }

    /// URL with the password replaced, safe for logs
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }

    /// Parse configuration from TOML text
    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;
        let value = match table.remove("database") {
            Some(section) => section,
            None => toml::Value::Table(table),
        };
        let config: ConnectionConfig = value.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("Invalid config file '{}'", path_ref.display())))?;

        log::debug!(
            "Loaded connection configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("FLATQUERY_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| {
                Error::config("Neither FLATQUERY_DATABASE_URL nor DATABASE_URL is set")
            })?;

        let mut config = Self::new(url);
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FLATQUERY_*` overrides on top of an existing configuration
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(engine) = env::var("FLATQUERY_DB_ENGINE") {
            self.engine = Some(engine.parse()?);
        }
        if let Ok(table_engine) = env::var("FLATQUERY_TABLE_ENGINE") {
            self.table_engine = table_engine;
        }
        if let Ok(debug) = env::var("FLATQUERY_DEBUG") {
            self.debug = matches!(debug.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

/// Builder for [`ConnectionConfig`]
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    url: Option<String>,
    engine: Option<DatabaseBackend>,
    table_engine: Option<String>,
    create_if_missing: Option<bool>,
    debug: bool,
}

impl ConnectionConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn engine(mut self, engine: DatabaseBackend) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn table_engine(mut self, table_engine: impl Into<String>) -> Self {
        self.table_engine = Some(table_engine.into());
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = Some(create);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn build(self) -> Result<ConnectionConfig> {
        let url = self
            .url
            .ok_or_else(|| Error::config("A database URL is required"))?;
        let config = ConnectionConfig {
            url,
            engine: self.engine,
            table_engine: self.table_engine.unwrap_or_else(default_table_engine),
            create_if_missing: self
                .create_if_missing
                .unwrap_or_else(default_create_if_missing),
            debug: self.debug,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Replace the password of a URL with `***`; unparsable input is returned unchanged
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}
