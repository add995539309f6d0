//! MySQL/MariaDB dialect
//!
//! The full dialect: keys, indexes, fulltext and auto-increment are all
//! applied online with `ALTER TABLE`.

use super::{
    column_definition, column_list, json_text, json_truthy, Ddl, IndexInfo, SqlDialect, Truncate,
};
use crate::database::statement::Row;
use crate::database::types::DatabaseBackend;
use crate::query_builder::identifier::{quote_identifier, sanitize_engine, sanitize_field_type};
use indexmap::IndexMap;

/// MySQL dialect
pub struct MySQLDialect;

impl MySQLDialect {
    /// Create a new MySQL dialect
    pub fn new() -> Self {
        Self
    }

    fn alter(table: &str, clauses: Vec<String>) -> Ddl {
        if clauses.is_empty() {
            return Ddl::Skip("nothing to alter");
        }
        Ddl::Execute(vec![format!(
            "ALTER TABLE {} {}",
            quote_identifier(table),
            clauses.join(", ")
        )])
    }

    fn alter_key(table: &str, keyword: &str, columns: &[String]) -> Ddl {
        let columns = column_list(columns);
        if columns.is_empty() {
            return Ddl::Skip("no columns given");
        }
        Self::alter(table, vec![format!("ADD {}({})", keyword, columns)])
    }
}

impl Default for MySQLDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for MySQLDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySQL
    }

    fn random_function(&self) -> &'static str {
        "RAND()"
    }

    fn list_tables_sql(&self) -> String {
        "SHOW TABLES".to_string()
    }

    fn table_exists_sql(&self) -> String {
        "SELECT TABLE_NAME FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME LIKE :table"
            .to_string()
    }

    fn describe_columns_sql(&self, table: &str) -> String {
        format!("SHOW COLUMNS FROM {}", quote_identifier(table))
    }

    fn column_name_key(&self) -> &'static str {
        "Field"
    }

    fn column_type_key(&self) -> &'static str {
        "Type"
    }

    fn is_primary_key_column(&self, column: &Row) -> bool {
        json_text(column.get("Key")).eq_ignore_ascii_case("PRI")
    }

    fn is_auto_increment_column(&self, column: &Row) -> bool {
        json_text(column.get("Extra"))
            .to_lowercase()
            .contains("auto_increment")
    }

    fn index_list_sql(&self, table: &str) -> String {
        format!("SHOW INDEX FROM {}", quote_identifier(table))
    }

    // One row per indexed column, already in Seq_in_index order
    fn read_index_list(&self, rows: &[Row]) -> Vec<IndexInfo> {
        let mut indexes: IndexMap<String, IndexInfo> = IndexMap::new();
        for row in rows {
            let name = json_text(row.get("Key_name"));
            let entry = indexes.entry(name.clone()).or_insert_with(|| IndexInfo {
                primary: name == "PRIMARY",
                unique: !json_truthy(row.get("Non_unique")),
                fulltext: json_text(row.get("Index_type")).eq_ignore_ascii_case("FULLTEXT"),
                name,
                columns: Vec::new(),
            });
            entry.columns.push(json_text(row.get("Column_name")));
        }
        indexes.into_values().collect()
    }

    fn create_table(
        &self,
        database: Option<&str>,
        table: &str,
        fields: &[(String, String)],
        engine: &str,
    ) -> String {
        // The schema name comes from the server, so it is escaped rather than cleaned
        let qualified = match database {
            Some(db) if !db.is_empty() => {
                format!("`{}`.{}", db.replace('`', "``"), quote_identifier(table))
            }
            _ => quote_identifier(table),
        };
        let columns: Vec<String> = fields
            .iter()
            .map(|(name, field_type)| column_definition(name, field_type))
            .collect();
        let engine = match sanitize_engine(engine) {
            e if e.is_empty() => "InnoDB".to_string(),
            e => e,
        };
        format!(
            "CREATE TABLE {} ({}) ENGINE={} CHARSET=utf8",
            qualified,
            columns.join(", "),
            engine
        )
    }

    fn add_columns(&self, table: &str, fields: &[(String, String)]) -> Vec<String> {
        let clauses: Vec<String> = fields
            .iter()
            .map(|(name, field_type)| format!("ADD {}", column_definition(name, field_type)))
            .collect();
        match Self::alter(table, clauses) {
            Ddl::Execute(statements) => statements,
            _ => Vec::new(),
        }
    }

    fn modify_columns(&self, table: &str, fields: &[(String, String)]) -> Ddl {
        let clauses = fields
            .iter()
            .map(|(name, field_type)| format!("MODIFY {}", column_definition(name, field_type)))
            .collect();
        Self::alter(table, clauses)
    }

    fn add_primary_key(&self, table: &str, columns: &[String]) -> Ddl {
        Self::alter_key(table, "PRIMARY KEY", columns)
    }

    fn add_unique(&self, table: &str, columns: &[String]) -> Ddl {
        Self::alter_key(table, "UNIQUE", columns)
    }

    fn add_index(&self, table: &str, columns: &[String]) -> Ddl {
        Self::alter_key(table, "INDEX", columns)
    }

    fn set_auto_increment(&self, table: &str, column: &str, column_type: &str) -> Ddl {
        Self::alter(
            table,
            vec![format!(
                "MODIFY COLUMN {} {} AUTO_INCREMENT",
                quote_identifier(column),
                sanitize_field_type(column_type)
            )],
        )
    }

    fn add_fulltext(&self, table: &str, columns: &[String]) -> Ddl {
        Self::alter_key(table, "FULLTEXT", columns)
    }

    fn truncate_table(&self, table: &str) -> Truncate {
        Truncate::Statement(format!("TRUNCATE TABLE {}", quote_identifier(table)))
    }
}
