//! SQLite dialect
//!
//! The restricted dialect. Tables are close to immutable after creation:
//! columns can be appended one at a time and secondary indexes created, but
//! keys, auto-increment, fulltext and column changes cannot be applied online.

use super::{
    column_definition, column_list, json_text, json_truthy, Ddl, IndexInfo, SchemaOp, SqlDialect,
    Truncate,
};
use crate::database::statement::Row;
use crate::database::types::DatabaseBackend;
use crate::query_builder::identifier::{clean_identifier, quote_identifier};

const NO_ONLINE_KEYS: &str = "keys can only be declared when the table is created";
const NO_AUTO_INCREMENT: &str =
    "AUTOINCREMENT requires an INTEGER PRIMARY KEY declared at creation time";
const NO_FULLTEXT: &str = "fulltext indexes are not available, use an FTS5 virtual table";
const NO_MODIFY: &str = "ALTER TABLE cannot change existing column definitions";

/// SQLite dialect
pub struct SQLiteDialect;

impl SQLiteDialect {
    /// Create a new SQLite dialect
    pub fn new() -> Self {
        Self
    }

    /// `idx_{table}_{columns}` built from cleaned names
    fn index_name(table: &str, columns: &[String]) -> String {
        let mut parts = vec!["idx".to_string(), clean_identifier(table).replace('.', "_")];
        parts.extend(columns.iter().map(|c| clean_identifier(c).replace('.', "_")));
        parts.join("_")
    }
}

impl Default for SQLiteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for SQLiteDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::SQLite
    }

    fn random_function(&self) -> &'static str {
        "RANDOM()"
    }

    fn unsupported(&self, op: SchemaOp) -> Option<&'static str> {
        match op {
            SchemaOp::ModifyColumns => Some(NO_MODIFY),
            SchemaOp::AutoIncrement => Some(NO_AUTO_INCREMENT),
            SchemaOp::Fulltext => Some(NO_FULLTEXT),
            SchemaOp::PrimaryKey | SchemaOp::Unique | SchemaOp::Index => None,
        }
    }

    fn list_tables_sql(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name"
            .to_string()
    }

    fn table_exists_sql(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = :table COLLATE NOCASE"
            .to_string()
    }

    fn describe_columns_sql(&self, table: &str) -> String {
        format!("PRAGMA table_info({})", quote_identifier(table))
    }

    fn column_name_key(&self) -> &'static str {
        "name"
    }

    fn column_type_key(&self) -> &'static str {
        "type"
    }

    fn is_primary_key_column(&self, column: &Row) -> bool {
        json_truthy(column.get("pk"))
    }

    fn is_auto_increment_column(&self, _column: &Row) -> bool {
        false
    }

    fn index_list_sql(&self, table: &str) -> String {
        format!("PRAGMA index_list({})", quote_identifier(table))
    }

    fn read_index_list(&self, rows: &[Row]) -> Vec<IndexInfo> {
        rows.iter()
            .map(|row| IndexInfo {
                name: json_text(row.get("name")),
                columns: Vec::new(),
                unique: json_truthy(row.get("unique")),
                primary: json_text(row.get("origin")) == "pk",
                fulltext: false,
            })
            .collect()
    }

    fn index_columns_sql(&self, index: &str) -> Option<String> {
        Some(format!("PRAGMA index_info({})", quote_identifier(index)))
    }

    fn create_table(
        &self,
        _database: Option<&str>,
        table: &str,
        fields: &[(String, String)],
        _engine: &str,
    ) -> String {
        let columns: Vec<String> = fields
            .iter()
            .map(|(name, field_type)| column_definition(name, field_type))
            .collect();
        format!(
            "CREATE TABLE {} ({})",
            quote_identifier(table),
            columns.join(", ")
        )
    }

    fn add_columns(&self, table: &str, fields: &[(String, String)]) -> Vec<String> {
        fields
            .iter()
            .map(|(name, field_type)| {
                format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_identifier(table),
                    column_definition(name, field_type)
                )
            })
            .collect()
    }

    fn modify_columns(&self, _table: &str, _fields: &[(String, String)]) -> Ddl {
        Ddl::Unsupported(NO_MODIFY)
    }

    fn add_primary_key(&self, _table: &str, _columns: &[String]) -> Ddl {
        Ddl::Skip(NO_ONLINE_KEYS)
    }

    fn add_unique(&self, _table: &str, _columns: &[String]) -> Ddl {
        Ddl::Skip(NO_ONLINE_KEYS)
    }

    fn add_index(&self, table: &str, columns: &[String]) -> Ddl {
        let list = column_list(columns);
        if list.is_empty() {
            return Ddl::Skip("no columns given");
        }
        Ddl::Execute(vec![format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_identifier(&Self::index_name(table, columns)),
            quote_identifier(table),
            list
        )])
    }

    fn set_auto_increment(&self, _table: &str, _column: &str, _column_type: &str) -> Ddl {
        Ddl::Unsupported(NO_AUTO_INCREMENT)
    }

    fn add_fulltext(&self, _table: &str, _columns: &[String]) -> Ddl {
        Ddl::Unsupported(NO_FULLTEXT)
    }

    fn truncate_table(&self, _table: &str) -> Truncate {
        Truncate::Recreate {
            capture_sql: "SELECT type, sql FROM sqlite_master \
                          WHERE tbl_name = :table COLLATE NOCASE AND sql IS NOT NULL \
                          ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_columns_one_statement_per_column() {
        let fields = vec![
            ("a".to_string(), "int".to_string()),
            ("b".to_string(), "varchar(20)".to_string()),
        ];
        assert_eq!(
            SQLiteDialect::new().add_columns("t", &fields),
            vec![
                "ALTER TABLE `t` ADD COLUMN `a` INT".to_string(),
                "ALTER TABLE `t` ADD COLUMN `b` VARCHAR(20)".to_string(),
            ]
        );
    }

    #[test]
    fn test_keys_are_skipped_and_fulltext_rejected() {
        let dialect = SQLiteDialect::new();
        let cols = vec!["id".to_string()];
        assert!(matches!(dialect.add_primary_key("t", &cols), Ddl::Skip(_)));
        assert!(matches!(dialect.add_unique("t", &cols), Ddl::Skip(_)));
        assert!(matches!(dialect.add_fulltext("t", &cols), Ddl::Unsupported(_)));
        assert!(matches!(
            dialect.set_auto_increment("t", "id", "INTEGER"),
            Ddl::Unsupported(_)
        ));
        assert!(dialect.unsupported(SchemaOp::Fulltext).is_some());
        assert!(dialect.unsupported(SchemaOp::Index).is_none());
    }

    #[test]
    fn test_index_uses_create_index() {
        let ddl = SQLiteDialect::new().add_index("items", &["a".to_string(), "b".to_string()]);
        assert_eq!(
            ddl,
            Ddl::Execute(vec![
                "CREATE INDEX IF NOT EXISTS `idx_items_a_b` ON `items` (`a`, `b`)".to_string()
            ])
        );
    }

    #[test]
    fn test_create_table_has_no_engine() {
        let sql = SQLiteDialect::new().create_table(
            Some("ignored"),
            "t",
            &[("id".to_string(), "int(10)".to_string())],
            "InnoDB",
        );
        assert_eq!(sql, "CREATE TABLE `t` (`id` INT(10))");
    }

    #[test]
    fn test_catalog_lookups_ignore_case() {
        let dialect = SQLiteDialect::new();
        assert!(dialect.table_exists_sql().ends_with("name = :table COLLATE NOCASE"));
        match dialect.truncate_table("items") {
            Truncate::Recreate { capture_sql } => {
                assert!(capture_sql.contains("tbl_name = :table COLLATE NOCASE"));
                assert!(capture_sql.starts_with("SELECT type, sql"));
            }
            other => panic!("expected recreation, got {other:?}"),
        }
    }
}
