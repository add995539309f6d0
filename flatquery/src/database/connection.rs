//! Live database handles
//!
//! A [`Connection`] wraps exactly one driver connection. Statements are run
//! through the text protocol when there is nothing to bind (so `BEGIN`, `PRAGMA`
//! and multi-statement scripts work everywhere) and as prepared statements
//! otherwise.

use crate::config::ConnectionConfig;
use crate::database::statement::Row;
use crate::database::types::{DatabaseBackend, MySqlTypeConverter, SqliteTypeConverter};
use crate::error::{Error, Result};
use crate::query_builder::Binding;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection as _};
use std::str::FromStr;

/// Identity of a connection as reported in events and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub backend: DatabaseBackend,
    /// Connection URL with the password masked
    pub url: String,
    /// Current schema on MySQL; `None` on SQLite
    pub database: Option<String>,
}

impl ConnectionInfo {
    pub fn new(backend: DatabaseBackend, url: impl AsRef<str>) -> Self {
        Self {
            backend,
            url: crate::config::mask_url(url.as_ref()),
            database: None,
        }
    }
}

/// What a statement produced once fully buffered
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// One open driver connection
pub enum Connection {
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

impl Connection {
    /// Open a connection and describe it
    pub async fn open(config: &ConnectionConfig) -> Result<(Self, ConnectionInfo)> {
        let backend = config.backend()?;
        let mut info = ConnectionInfo::new(backend, &config.url);

        log::debug!("Connecting to {} at {}", backend, info.url);

        let connection = match backend {
            DatabaseBackend::MySQL => {
                let options = MySqlConnectOptions::from_str(&config.url).map_err(|e| {
                    Error::connection(format!("Invalid MySQL URL '{}': {}", info.url, e))
                })?;
                let mut conn = options.connect().await.map_err(|e| {
                    Error::connection(format!("Failed to connect to MySQL at {}: {}", info.url, e))
                })?;
                info.database = sqlx::query_scalar::<_, Option<String>>("SELECT DATABASE()")
                    .fetch_one(&mut conn)
                    .await
                    .map_err(|e| {
                        Error::connection(format!("Failed to resolve current database: {}", e))
                    })?;
                Connection::MySql(conn)
            }
            DatabaseBackend::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .map_err(|e| {
                        Error::connection(format!("Invalid SQLite URL '{}': {}", info.url, e))
                    })?
                    .create_if_missing(config.create_if_missing)
                    .with_regexp();
                let conn = options.connect().await.map_err(|e| {
                    Error::connection(format!("Failed to open SQLite database {}: {}", info.url, e))
                })?;
                Connection::Sqlite(conn)
            }
        };

        log::info!("Connected to {} ({})", backend, info.url);
        Ok((connection, info))
    }

    pub fn backend(&self) -> DatabaseBackend {
        match self {
            Connection::MySql(_) => DatabaseBackend::MySQL,
            Connection::Sqlite(_) => DatabaseBackend::SQLite,
        }
    }

    /// Run a row-returning statement; `params` are in placeholder order
    pub(crate) async fn fetch(
        &mut self,
        sql: &str,
        params: &[Binding],
    ) -> std::result::Result<Vec<Row>, DriverFailure> {
        match self {
            Connection::MySql(conn) => {
                let rows = if params.is_empty() {
                    sqlx::raw_sql(sql).fetch_all(&mut *conn).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = MySqlTypeConverter::bind_param(query, param);
                    }
                    query.fetch_all(&mut *conn).await?
                };
                rows.iter()
                    .map(MySqlTypeConverter::row_to_map)
                    .collect::<Result<Vec<_>>>()
                    .map_err(DriverFailure::Decode)
            }
            Connection::Sqlite(conn) => {
                let rows = if params.is_empty() {
                    sqlx::raw_sql(sql).fetch_all(&mut *conn).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = SqliteTypeConverter::bind_param(query, param);
                    }
                    query.fetch_all(&mut *conn).await?
                };
                rows.iter()
                    .map(SqliteTypeConverter::row_to_map)
                    .collect::<Result<Vec<_>>>()
                    .map_err(DriverFailure::Decode)
            }
        }
    }

    /// Run a statement that reports affected rows instead of returning them
    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        params: &[Binding],
    ) -> std::result::Result<Outcome, DriverFailure> {
        match self {
            Connection::MySql(conn) => {
                let result = if params.is_empty() {
                    sqlx::raw_sql(sql).execute(&mut *conn).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = MySqlTypeConverter::bind_param(query, param);
                    }
                    query.execute(&mut *conn).await?
                };
                // MySQL reports 0 when the statement generated no id
                let last_insert_id = match result.last_insert_id() {
                    0 => None,
                    id => i64::try_from(id).ok(),
                };
                Ok(Outcome {
                    rows: Vec::new(),
                    rows_affected: result.rows_affected(),
                    last_insert_id,
                })
            }
            Connection::Sqlite(conn) => {
                let result = if params.is_empty() {
                    sqlx::raw_sql(sql).execute(&mut *conn).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = SqliteTypeConverter::bind_param(query, param);
                    }
                    query.execute(&mut *conn).await?
                };
                let last_insert_id = match result.last_insert_rowid() {
                    0 => None,
                    id => Some(id),
                };
                Ok(Outcome {
                    rows: Vec::new(),
                    rows_affected: result.rows_affected(),
                    last_insert_id,
                })
            }
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        let outcome = match self {
            Connection::MySql(conn) => conn.ping().await,
            Connection::Sqlite(conn) => conn.ping().await,
        };
        outcome.map_err(|e| Error::connection(format!("Ping failed: {}", e)))
    }

    pub async fn close(self) -> Result<()> {
        let outcome = match self {
            Connection::MySql(conn) => conn.close().await,
            Connection::Sqlite(conn) => conn.close().await,
        };
        outcome.map_err(|e| Error::connection(format!("Failed to close connection: {}", e)))
    }
}

/// Failure inside the driver, before it is tied to the query that caused it
#[derive(Debug)]
pub(crate) enum DriverFailure {
    Driver(sqlx::Error),
    Decode(Error),
}

impl From<sqlx::Error> for DriverFailure {
    fn from(err: sqlx::Error) -> Self {
        DriverFailure::Driver(err)
    }
}

impl DriverFailure {
    /// Attach the query description and produce the public error
    pub(crate) fn into_error(self, query: impl Into<String>) -> Error {
        match self {
            DriverFailure::Driver(err) => Error::from_driver(err, query),
            DriverFailure::Decode(err) => err,
        }
    }
}
