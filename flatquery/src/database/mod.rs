//! Connections, statement execution and schema management
//!
//! One [`Executor`] owns one live MySQL or SQLite connection. Queries described
//! by a `QuerySpec` are built for the connection's dialect, run, and returned
//! as fully buffered [`Statement`]s. [`SchemaManager`] builds on the executor
//! for structural changes.

pub mod connection;
pub mod executor;
pub mod schema;
pub mod statement;
pub mod types;

// Re-export main types for convenience
pub use connection::{Connection, ConnectionInfo};
pub use executor::Executor;
pub use schema::{SchemaManager, SchemaReport, TableSchema};
pub use statement::{FetchStyle, Row, Statement};
pub use types::{DatabaseBackend, SqlValue};
