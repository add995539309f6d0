//! Dialect strategies
//!
//! Every piece of SQL that differs between the full dialect (MySQL/MariaDB)
//! and the restricted dialect (SQLite) is produced here, so neither the
//! query builder nor the schema manager branches on the backend themselves.

use crate::database::statement::Row;
use crate::database::types::DatabaseBackend;
use crate::query_builder::identifier::{quote_identifier, sanitize_field_type};
use serde_json::Value as JsonValue;

pub mod mysql;
pub mod sqlite;

pub use mysql::MySQLDialect;
pub use sqlite::SQLiteDialect;

/// Structural operations whose support differs per dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOp {
    ModifyColumns,
    PrimaryKey,
    Unique,
    Index,
    AutoIncrement,
    Fulltext,
}

impl SchemaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaOp::ModifyColumns => "modify_fields",
            SchemaOp::PrimaryKey => "set_primary_key",
            SchemaOp::Unique => "set_unique",
            SchemaOp::Index => "set_index",
            SchemaOp::AutoIncrement => "set_auto_increment",
            SchemaOp::Fulltext => "set_fulltext",
        }
    }
}

/// Outcome of asking a dialect for a DDL primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Ddl {
    /// Run these statements in order
    Execute(Vec<String>),
    /// Accepted without touching the schema
    Skip(&'static str),
    /// Cannot be expressed on this dialect
    Unsupported(&'static str),
}

/// How a dialect empties a table
#[derive(Debug, Clone, PartialEq)]
pub enum Truncate {
    Statement(String),
    /// Capture the creation statements with `capture_sql`, drop, re-run them
    Recreate { capture_sql: String },
}

/// Index description normalized from the dialect's catalog rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
    pub fulltext: bool,
}

impl IndexInfo {
    /// Same column set, ignoring order and case
    pub fn covers_exactly(&self, columns: &[String]) -> bool {
        let normalize = |cols: &[String]| {
            let mut cols: Vec<String> = cols.iter().map(|c| c.to_lowercase()).collect();
            cols.sort();
            cols
        };
        normalize(&self.columns) == normalize(columns)
    }
}

/// Dialect-specific SQL primitives
pub trait SqlDialect: Send + Sync {
    fn backend(&self) -> DatabaseBackend;

    /// Expression used for random ordering
    fn random_function(&self) -> &'static str;

    /// Reason an operation is unsupported, checked before any catalog lookups
    fn unsupported(&self, _op: SchemaOp) -> Option<&'static str> {
        None
    }

    fn list_tables_sql(&self) -> String;

    /// Catalog query binding `:table`
    fn table_exists_sql(&self) -> String;

    fn describe_columns_sql(&self, table: &str) -> String;

    /// Key holding the column name in a describe row
    fn column_name_key(&self) -> &'static str;

    /// Key holding the declared type in a describe row
    fn column_type_key(&self) -> &'static str;

    fn is_primary_key_column(&self, column: &Row) -> bool;

    fn is_auto_increment_column(&self, column: &Row) -> bool;

    fn index_list_sql(&self, table: &str) -> String;

    fn read_index_list(&self, rows: &[Row]) -> Vec<IndexInfo>;

    /// Follow-up query listing an index's columns, when the list query lacks them
    fn index_columns_sql(&self, _index: &str) -> Option<String> {
        None
    }

    fn create_table(
        &self,
        database: Option<&str>,
        table: &str,
        fields: &[(String, String)],
        engine: &str,
    ) -> String;

    fn add_columns(&self, table: &str, fields: &[(String, String)]) -> Vec<String>;

    fn modify_columns(&self, table: &str, fields: &[(String, String)]) -> Ddl;

    fn add_primary_key(&self, table: &str, columns: &[String]) -> Ddl;

    fn add_unique(&self, table: &str, columns: &[String]) -> Ddl;

    fn add_index(&self, table: &str, columns: &[String]) -> Ddl;

    fn set_auto_increment(&self, table: &str, column: &str, column_type: &str) -> Ddl;

    fn add_fulltext(&self, table: &str, columns: &[String]) -> Ddl;

    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", quote_identifier(table))
    }

    fn truncate_table(&self, table: &str) -> Truncate;
}

/// Factory function to create the appropriate dialect for a database backend
pub fn create_dialect(backend: DatabaseBackend) -> Box<dyn SqlDialect> {
    match backend {
        DatabaseBackend::MySQL => Box::new(MySQLDialect::new()),
        DatabaseBackend::SQLite => Box::new(SQLiteDialect::new()),
    }
}

/// `` `a`, `b` `` from raw column names
pub(crate) fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `` `name` TYPE `` with the type sanitized; an empty type falls back to TEXT
pub(crate) fn column_definition(name: &str, field_type: &str) -> String {
    let field_type = sanitize_field_type(field_type);
    let field_type = if field_type.trim().is_empty() {
        "TEXT".to_string()
    } else {
        field_type
    };
    format!("{} {}", quote_identifier(name), field_type.trim())
}

/// Catalog flags arrive as numbers or numeric strings depending on the driver
pub(crate) fn json_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s != "0"
        }
        _ => false,
    }
}

pub(crate) fn json_text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_helpers() {
        assert_eq!(
            column_list(&["id".to_string(), "na me".to_string()]),
            "`id`, `name`"
        );
        assert_eq!(column_definition("val", "text"), "`val` TEXT");
        assert_eq!(column_definition("val", ";;"), "`val` TEXT");
    }

    #[test]
    fn test_json_truthy() {
        assert!(json_truthy(Some(&json!(1))));
        assert!(!json_truthy(Some(&json!("0"))));
        assert!(!json_truthy(None));
    }

    #[test]
    fn test_index_covers_exactly() {
        let index = IndexInfo {
            name: "ab".into(),
            columns: vec!["A".into(), "b".into()],
            ..Default::default()
        };
        assert!(index.covers_exactly(&["b".to_string(), "a".to_string()]));
        assert!(!index.covers_exactly(&["a".to_string()]));
    }

    #[test]
    fn test_factory_matches_backend() {
        for backend in [DatabaseBackend::MySQL, DatabaseBackend::SQLite] {
            assert_eq!(create_dialect(backend).backend(), backend);
        }
    }
}
