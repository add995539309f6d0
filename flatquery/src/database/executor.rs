//! Statement execution
//!
//! An [`Executor`] owns one connection and runs one statement at a time. Every
//! statement goes through the same path: build, notify the sink, bind
//! positionally, run, buffer the result, and on failure wrap the driver error
//! together with a description of what was asked for.

use crate::config::ConnectionConfig;
use crate::database::connection::{Connection, ConnectionInfo, DriverFailure, Outcome};
use crate::database::statement::{FetchStyle, Row, Statement};
use crate::database::types::DatabaseBackend;
use crate::error::{Error, Result};
use crate::events::{names, EventSink, NoopSink, QueryEvent};
use crate::query_builder::{
    Action, ActionTarget, BuiltQuery, Limit, QueryBuilder, QuerySpec, SqlDialect,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;

/// Leading keywords of statements that produce a result set
const ROW_RETURNING: &[&str] = &[
    "SELECT", "SHOW", "PRAGMA", "WITH", "DESCRIBE", "DESC", "EXPLAIN", "VALUES",
];

/// Runs built queries against one live connection
pub struct Executor {
    connection: Connection,
    info: ConnectionInfo,
    builder: QueryBuilder,
    sink: Arc<dyn EventSink>,
    table_engine: String,
    debug: bool,
}

impl Executor {
    /// Open a connection described by `config`
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let (connection, info) = Connection::open(config).await?;
        Ok(Self::from_connection(connection, info, config))
    }

    fn from_connection(
        connection: Connection,
        info: ConnectionInfo,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            builder: QueryBuilder::new(connection.backend()),
            connection,
            info,
            sink: Arc::new(NoopSink),
            table_engine: config.table_engine.clone(),
            debug: config.debug,
        }
    }

    /// Replace the event sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = sink;
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.builder.backend()
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.builder.dialect()
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Storage engine used when creating tables on MySQL
    pub fn table_engine(&self) -> &str {
        &self.table_engine
    }

    /// Build without executing
    pub fn build(&self, spec: &QuerySpec) -> BuiltQuery {
        self.builder.build(spec)
    }

    /// Build and run a spec
    pub async fn execute(&mut self, spec: &QuerySpec) -> Result<Statement> {
        let event = QueryEvent::new(names::PRE_BUILD, self.info.clone(), Some(spec.clone()));
        self.sink.pre_build(&event);

        let query = self.builder.build(spec);
        self.dispatch(event, query, spec.debug, spec.dump()).await
    }

    /// Run a spec and return its rows in the requested shape
    pub async fn fetch_rows(&mut self, spec: &QuerySpec, style: FetchStyle) -> Result<Vec<Row>> {
        Ok(self.execute(spec).await?.fetch(style))
    }

    /// First row of a select; a missing limit is set to 1
    pub async fn fetch_one(&mut self, spec: &QuerySpec) -> Result<Option<Row>> {
        if spec.action() == Action::Select && spec.limit.is_none() {
            let mut limited = spec.clone();
            limited.limit = Some(Limit::from(1i64));
            return Ok(self.execute(&limited).await?.fetch_one());
        }
        Ok(self.execute(spec).await?.fetch_one())
    }

    /// Number of rows matching the spec's tables and conditions
    pub async fn count(&mut self, spec: &QuerySpec) -> Result<i64> {
        let mut counting = spec.clone();
        if counting.action() != Action::Count {
            let tables = counting.tables().to_vec();
            counting.insert = None;
            counting.replace = None;
            counting.update = None;
            counting.delete = None;
            counting.count = Some(ActionTarget::Tables(tables));
        }
        counting.order = None;
        counting.limit = None;

        let statement = self.execute(&counting).await?;
        let value = statement
            .fetch_one()
            .and_then(|row| row.get("count").cloned())
            .unwrap_or(JsonValue::Null);

        match value {
            JsonValue::Number(n) => Ok(n.as_i64().unwrap_or_default()),
            JsonValue::String(s) => s.trim().parse().map_err(|_| {
                Error::invalid_input(format!("COUNT returned a non-numeric value '{}'", s))
            }),
            _ => Ok(0),
        }
    }

    /// Run SQL as written, without bindings
    pub async fn execute_raw(&mut self, sql: &str) -> Result<Statement> {
        let event = QueryEvent::new(names::PRE_BUILD, self.info.clone(), None);
        self.dispatch(event, BuiltQuery::raw(sql), false, sql.to_string())
            .await
    }

    /// Run an already built query, e.g. a catalog lookup with bindings
    pub async fn execute_query(&mut self, query: BuiltQuery) -> Result<Statement> {
        let event = QueryEvent::new(names::PRE_BUILD, self.info.clone(), None);
        let report_as = query.sql.clone();
        self.dispatch(event, query, false, report_as).await
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.connection.ping().await
    }

    pub async fn close(self) -> Result<()> {
        self.connection.close().await
    }

    async fn dispatch(
        &mut self,
        event: QueryEvent,
        query: BuiltQuery,
        debug: bool,
        report_as: String,
    ) -> Result<Statement> {
        let backend = self.backend();
        let event = event.with_sql(&query.sql);

        if debug || self.debug {
            log::info!("[{}] {}", backend, query.interpolated());
        } else {
            #[cfg(debug_assertions)]
            {
                log::debug!("[{}] {}", backend, query.sql);
                log::debug!("  Bindings: {:?}", query.bindings);
            }
        }

        self.sink.pre_execute(&event.stage(names::PRE_EXECUTE));

        let (sql, params) = query.positional();
        let started = Instant::now();
        let outcome = if returns_rows(&sql) {
            self.connection
                .fetch(&sql, &params)
                .await
                .map(|rows| Outcome {
                    rows,
                    ..Outcome::default()
                })
        } else {
            self.connection.execute(&sql, &params).await
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(outcome) => {
                self.sink
                    .post_execute(&event.stage(names::POST_EXECUTE).with_elapsed(elapsed));
                Ok(Statement::new(
                    query.sql,
                    query.bindings,
                    outcome.rows,
                    outcome.rows_affected,
                    outcome.last_insert_id,
                ))
            }
            Err(failure) => Err(self.fail(&event, failure, report_as, elapsed)),
        }
    }

    fn fail(
        &self,
        event: &QueryEvent,
        failure: DriverFailure,
        report_as: String,
        elapsed: std::time::Duration,
    ) -> Error {
        let err = failure.into_error(report_as);
        log::error!("[{}] {}", self.backend(), err);
        self.sink.post_error(
            &event
                .stage(names::POST_ERROR)
                .with_elapsed(elapsed)
                .with_error(err.to_string()),
        );
        err
    }
}

/// Whether the statement's first keyword yields a result set
fn returns_rows(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();
    ROW_RETURNING.contains(&keyword.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventEmitter;
    use std::sync::Mutex;

    async fn memory() -> Executor {
        Executor::connect(&ConnectionConfig::sqlite_memory())
            .await
            .unwrap()
    }

    #[test]
    fn test_returns_rows_by_leading_keyword() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  (select 1)"));
        assert!(returns_rows("pragma table_info(`t`)"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows("BEGIN"));
    }

    #[tokio::test]
    async fn test_execute_raw_and_last_insert_id() {
        let mut db = memory().await;
        db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
            .await
            .unwrap();

        let spec = QuerySpec::from_json_str(r#"{"insert": ["t"], "set": {"val": "a"}}"#).unwrap();
        let stmt = db.execute(&spec).await.unwrap();
        assert_eq!(stmt.rows_affected(), 1);
        assert_eq!(stmt.last_insert_id(), Some(1));

        let count = db
            .count(&QuerySpec::from_json_str(r#"{"from": ["t"]}"#).unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_failure_is_wrapped_with_spec_dump_and_reported() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        let seen = errors.clone();
        emitter.on(names::POST_ERROR, move |event| {
            seen.lock().unwrap().push(event.sql.clone().unwrap_or_default())
        });

        let mut db = memory().await.with_sink(Arc::new(emitter));
        let spec = QuerySpec::from_json_str(r#"{"from": ["missing"]}"#).unwrap();
        let err = db.execute(&spec).await.unwrap_err();

        match &err {
            Error::Execution { query, message, .. } => {
                assert!(query.contains("missing"));
                assert!(message.contains("no such table"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*errors.lock().unwrap(), vec!["SELECT * FROM `missing`".to_string()]);
    }

    #[tokio::test]
    async fn test_raw_transaction_statements() {
        let mut db = memory().await;
        db.execute_raw("CREATE TABLE t (id INTEGER)").await.unwrap();
        db.execute_raw("BEGIN").await.unwrap();
        db.execute_raw("INSERT INTO t VALUES (1)").await.unwrap();
        db.execute_raw("ROLLBACK").await.unwrap();

        let rows = db.execute_raw("SELECT * FROM t").await.unwrap();
        assert_eq!(rows.row_count(), 0);
        db.ping().await.unwrap();
    }
}
