//! Unified type system for database operations
//!
//! `SqlValue` is the single value model shared by the query builder and the
//! executor. Each driver has a converter that binds values positionally and
//! turns driver rows back into ordered JSON maps.

pub mod converter;
pub mod mysql_converter;
pub mod sqlite_converter;
pub mod value;

// Re-export the main types
pub use converter::DatabaseBackend;
pub use mysql_converter::MySqlTypeConverter;
pub use sqlite_converter::SqliteTypeConverter;
pub use value::SqlValue;
