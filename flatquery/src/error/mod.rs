use crate::database::types::DatabaseBackend;
use thiserror::Error;

pub mod context;

pub type Result<T> = std::result::Result<T, Error>;

// Re-export context helpers
pub use context::{ErrorChain, ErrorContext};

/// Main error type for flatquery
#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not be reached or rejected the credentials
    #[error("Database connection error: {0}")]
    Connection(String),

    /// A statement failed inside the driver
    #[error("Database query error [{}]: {message} (query: {query})", code.as_deref().unwrap_or("-"))]
    Execution {
        code: Option<String>,
        message: String,
        query: String,
    },

    /// The structural operation cannot be expressed on the active dialect
    #[error("Schema operation '{operation}' is not supported by {backend}: {reason}")]
    Schema {
        backend: DatabaseBackend,
        operation: String,
        reason: String,
    },

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn execution(
        code: Option<String>,
        message: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            query: query.into(),
        }
    }

    pub fn schema(
        backend: DatabaseBackend,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Schema {
            backend,
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap a driver failure, keeping its native error code when there is one
    pub(crate) fn from_driver(err: sqlx::Error, query: impl Into<String>) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };
        let message = match &err {
            sqlx::Error::Database(db_err) => db_err.message().to_string(),
            other => other.to_string(),
        };
        Self::execution(code, message, query)
    }

    /// Driver error code of the underlying failure, if any
    pub fn driver_code(&self) -> Option<&str> {
        match self {
            Error::Execution { code, .. } => code.as_deref(),
            Error::WithContext { source, .. } => source.driver_code(),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get a stable error code for logs and callers
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Connection(_) => "E_DB_CONNECTION",
            Error::Execution { .. } => "E_DB_QUERY",
            Error::Schema { .. } => "E_DB_SCHEMA",
            Error::ColumnNotFound { .. } => "E_DB_COLUMN",
            Error::Config(_) => "E_CONFIG",
            Error::InvalidInput(_) => "E_INVALID_INPUT",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
            #[cfg(feature = "config")]
            Error::Toml(_) => "E_CONFIG",
            Error::WithContext { source, .. } => source.error_code(),
        }
    }
}
