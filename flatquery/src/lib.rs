//! flatquery - cross-dialect SQL query building and schema management
//!
//! flatquery provides one contract over MySQL/MariaDB and SQLite:
//! - flat `QuerySpec` descriptions turned into SQL with named bindings
//! - an executor with lifecycle events and wrapped driver errors
//! - schema introspection and changes that report what a dialect cannot do

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod query_builder;

// Re-export main types for public API
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use database::{
    ConnectionInfo, DatabaseBackend, Executor, FetchStyle, Row, SchemaManager, SchemaReport,
    SqlValue, Statement, TableSchema,
};
pub use error::{Error, ErrorContext, Result};
pub use events::{EventEmitter, EventSink, LogSink, NoopSink, QueryEvent};
pub use query_builder::{BuiltQuery, QueryBuilder, QuerySpec};

/// Everything needed for day-to-day use
pub mod prelude {
    pub use crate::config::ConnectionConfig;
    pub use crate::database::{
        DatabaseBackend, Executor, FetchStyle, Row, SchemaManager, SqlValue, Statement,
        TableSchema,
    };
    pub use crate::error::{Error, ErrorContext, Result};
    pub use crate::events::{EventEmitter, EventSink, QueryEvent};
    pub use crate::query_builder::{
        Binding, BuiltQuery, Condition, Limit, Operator, OrderEntry, OrderSpec, ParamType,
        QueryBuilder, QuerySpec, SelectItem, SortDirection,
    };
}
