//! Cross-dialect query builder
//!
//! Turns a flat `QuerySpec` into dialect-correct SQL with named placeholders
//! and a binding map. The builder is pure: no I/O, no failure modes.

pub mod core;
pub mod dialects;
pub mod identifier;
pub mod params;
pub mod query_spec;

pub use self::core::{BuiltQuery, QueryBuilder};
pub use dialects::{create_dialect, Ddl, IndexInfo, SchemaOp, SqlDialect, Truncate};
pub use dialects::{MySQLDialect, SQLiteDialect};
pub use identifier::{clean_identifier, quote_identifier, sanitize_field_type};
pub use params::{Binding, Bindings, ParamAllocator, ParamType};
pub use query_spec::{
    Action, ActionTarget, Condition, Limit, Operator, OrderEntry, OrderSpec, QuerySpec,
    SelectItem, SortDirection, WhereClause,
};

// Re-export SqlValue from the unified type system
pub use crate::database::types::SqlValue;
