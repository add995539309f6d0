//! Table structure introspection and changes
//!
//! [`SchemaManager`] never branches on the backend itself. It asks the
//! connection's [`SqlDialect`] for statements and acts on the answer:
//! run them, accept a documented no-op, or report the operation as
//! unsupported with [`Error::Schema`].
//!
//! ```no_run
//! use flatquery::{ConnectionConfig, Executor, TableSchema};
//!
//! # async fn demo() -> flatquery::Result<()> {
//! let mut db = Executor::connect(&ConnectionConfig::new("sqlite::memory:")).await?;
//! let table = TableSchema::new("items")
//!     .field("id", "int(10)")
//!     .field("val", "text")
//!     .index(["val"]);
//! let report = db.schema().create_table_from(&table).await?;
//! assert!(report.unsupported.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::database::executor::Executor;
use crate::database::statement::Row;
use crate::error::{Error, ErrorChain, ErrorContext, Result};
use crate::query_builder::dialects::json_text;
use crate::query_builder::{
    clean_identifier, Binding, BuiltQuery, Ddl, IndexInfo, SchemaOp, SqlValue, Truncate,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Desired structure of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    pub name: String,
    /// Column name → declared type, in creation order
    pub fields: IndexMap<String, String>,
    pub primary_key: Vec<String>,
    pub unique: Vec<String>,
    pub index: Vec<String>,
    pub auto_increment: Option<String>,
    pub fulltext: Vec<String>,
    /// Storage engine on MySQL; the connection default when unset
    pub engine: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.fields.insert(name.into(), field_type.into());
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn index<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_increment(mut self, column: impl Into<String>) -> Self {
        self.auto_increment = Some(column.into());
        self
    }

    pub fn fulltext<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fulltext = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }
}

/// What `create_table_from` did beyond creating the table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaReport {
    pub applied: Vec<SchemaOp>,
    /// Accepted as no-ops by the dialect
    pub skipped: Vec<(SchemaOp, String)>,
    /// Rejected by the dialect; the table exists without them
    pub unsupported: Vec<(SchemaOp, String)>,
}

enum Step {
    Applied,
    Skipped(&'static str),
}

/// Schema operations over one executor
pub struct SchemaManager<'a> {
    executor: &'a mut Executor,
}

impl Executor {
    /// Schema operations on this connection
    pub fn schema(&mut self) -> SchemaManager<'_> {
        SchemaManager::new(self)
    }
}

impl<'a> SchemaManager<'a> {
    pub fn new(executor: &'a mut Executor) -> Self {
        Self { executor }
    }

    /// Names of the tables in the current database
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let sql = self.executor.dialect().list_tables_sql();
        let statement = self.executor.execute_raw(&sql).await?;
        Ok(statement
            .rows()
            .iter()
            .filter_map(|row| row.values().next().map(|v| json_text(Some(v))))
            .collect())
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let query = BuiltQuery::raw(self.executor.dialect().table_exists_sql())
            .with_binding("table", Binding::new(SqlValue::from(catalog_name(table))));
        Ok(self.executor.execute_query(query).await?.row_count() > 0)
    }

    pub async fn create_table(&mut self, table: &str, fields: &IndexMap<String, String>) -> Result<()> {
        let engine = self.executor.table_engine().to_string();
        self.create_with_engine(table, fields, &engine).await
    }

    async fn create_with_engine(
        &mut self,
        table: &str,
        fields: &IndexMap<String, String>,
        engine: &str,
    ) -> Result<()> {
        let fields = field_pairs(fields);
        let database = self.executor.info().database.clone();
        let sql = self
            .executor
            .dialect()
            .create_table(database.as_deref(), table, &fields, engine);
        log::info!("Creating table {}", clean_identifier(table));
        self.executor.execute_raw(&sql).await?;
        Ok(())
    }

    /// Create a table and apply its keys in a valid order
    ///
    /// The primary key is applied before auto-increment. Operations the
    /// dialect rejects are collected in the report instead of failing, since
    /// the table itself already exists at that point.
    pub async fn create_table_from(&mut self, schema: &TableSchema) -> Result<SchemaReport> {
        let engine = match &schema.engine {
            Some(engine) => engine.clone(),
            None => self.executor.table_engine().to_string(),
        };
        self.create_with_engine(&schema.name, &schema.fields, &engine)
            .await?;

        let mut report = SchemaReport::default();
        let table = schema.name.as_str();

        let steps: [(SchemaOp, &[String]); 3] = [
            (SchemaOp::PrimaryKey, &schema.primary_key),
            (SchemaOp::Unique, &schema.unique),
            (SchemaOp::Index, &schema.index),
        ];
        for (op, columns) in steps {
            if columns.is_empty() {
                continue;
            }
            let outcome = self.apply_key(op, table, columns).await;
            record(&mut report, op, outcome)?;
        }

        if let Some(column) = &schema.auto_increment {
            let outcome = self.auto_increment_step(table, column).await;
            record(&mut report, SchemaOp::AutoIncrement, outcome)?;
        }

        if !schema.fulltext.is_empty() {
            let outcome = self.fulltext_step(table, &schema.fulltext).await;
            record(&mut report, SchemaOp::Fulltext, outcome)?;
        }

        Ok(report)
    }

    /// Append columns to an existing table
    pub async fn append_fields(
        &mut self,
        table: &str,
        fields: &IndexMap<String, String>,
    ) -> Result<()> {
        let statements = self
            .executor
            .dialect()
            .add_columns(table, &field_pairs(fields));
        for sql in statements {
            log::info!("{}", sql);
            self.executor.execute_raw(&sql).await?;
        }
        Ok(())
    }

    /// Change the declared type of existing columns
    pub async fn modify_fields(
        &mut self,
        table: &str,
        fields: &IndexMap<String, String>,
    ) -> Result<()> {
        self.ensure_supported(SchemaOp::ModifyColumns)?;
        let ddl = self
            .executor
            .dialect()
            .modify_columns(table, &field_pairs(fields));
        self.apply(SchemaOp::ModifyColumns, ddl).await.map(|_| ())
    }

    pub async fn set_primary_key<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<()> {
        self.apply_key(SchemaOp::PrimaryKey, table, &owned(columns))
            .await
            .map(|_| ())
    }

    pub async fn set_unique<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<()> {
        self.apply_key(SchemaOp::Unique, table, &owned(columns))
            .await
            .map(|_| ())
    }

    pub async fn set_index<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<()> {
        self.apply_key(SchemaOp::Index, table, &owned(columns))
            .await
            .map(|_| ())
    }

    /// Make `column` auto-increment, keeping its current type
    pub async fn set_auto_increment(&mut self, table: &str, column: &str) -> Result<()> {
        self.auto_increment_step(table, column).await.map(|_| ())
    }

    /// Add a fulltext index; a no-op when one on the same columns exists
    pub async fn set_fulltext<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<()> {
        self.fulltext_step(table, &owned(columns)).await.map(|_| ())
    }

    /// Dialect-native column descriptor rows
    pub async fn describe_columns(&mut self, table: &str) -> Result<Vec<Row>> {
        let sql = self.executor.dialect().describe_columns_sql(table);
        Ok(self.executor.execute_raw(&sql).await?.into_rows())
    }

    /// Column names in table order
    pub async fn get_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let key = self.executor.dialect().column_name_key();
        Ok(self
            .describe_columns(table)
            .await?
            .iter()
            .map(|row| json_text(row.get(key)))
            .collect())
    }

    /// Indexes of a table with their columns
    pub async fn indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>> {
        let sql = self.executor.dialect().index_list_sql(table);
        let rows = self.executor.execute_raw(&sql).await?.into_rows();
        let mut indexes = self.executor.dialect().read_index_list(&rows);

        for index in indexes.iter_mut().filter(|i| i.columns.is_empty()) {
            let Some(sql) = self.executor.dialect().index_columns_sql(&index.name) else {
                continue;
            };
            index.columns = self
                .executor
                .execute_raw(&sql)
                .await?
                .rows()
                .iter()
                .map(|row| json_text(row.get("name")))
                .collect();
        }
        Ok(indexes)
    }

    pub async fn has_primary_key(&mut self, table: &str) -> Result<bool> {
        let columns = self.describe_columns(table).await?;
        let dialect = self.executor.dialect();
        Ok(columns.iter().any(|c| dialect.is_primary_key_column(c)))
    }

    pub async fn has_auto_increment(&mut self, table: &str) -> Result<bool> {
        let columns = self.describe_columns(table).await?;
        let dialect = self.executor.dialect();
        Ok(columns.iter().any(|c| dialect.is_auto_increment_column(c)))
    }

    /// Whether a unique index covers exactly these columns
    pub async fn has_unique<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<bool> {
        let columns = owned(columns);
        Ok(self
            .indexes(table)
            .await?
            .iter()
            .any(|i| i.unique && !i.primary && i.covers_exactly(&columns)))
    }

    /// Whether a plain or unique secondary index covers exactly these columns
    pub async fn has_index<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<bool> {
        let columns = owned(columns);
        Ok(self
            .indexes(table)
            .await?
            .iter()
            .any(|i| !i.primary && !i.fulltext && i.covers_exactly(&columns)))
    }

    pub async fn has_fulltext<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<bool> {
        let columns = owned(columns);
        Ok(self
            .indexes(table)
            .await?
            .iter()
            .any(|i| i.fulltext && i.covers_exactly(&columns)))
    }

    pub async fn drop_table(&mut self, table: &str) -> Result<()> {
        let sql = self.executor.dialect().drop_table(table);
        log::info!("{}", sql);
        self.executor.execute_raw(&sql).await?;
        Ok(())
    }

    /// Remove every row, keeping the table definition and its indexes
    pub async fn truncate_table(&mut self, table: &str) -> Result<()> {
        match self.executor.dialect().truncate_table(table) {
            Truncate::Statement(sql) => {
                log::info!("{}", sql);
                self.executor.execute_raw(&sql).await?;
            }
            Truncate::Recreate { capture_sql } => {
                let capture = BuiltQuery::raw(capture_sql)
                    .with_binding("table", Binding::new(SqlValue::from(catalog_name(table))));
                let captured = self.executor.execute_query(capture).await?;
                if !captured
                    .rows()
                    .iter()
                    .any(|row| json_text(row.get("type")) == "table")
                {
                    return Err(Error::invalid_input(format!(
                        "Cannot truncate '{}': table not found",
                        clean_identifier(table)
                    )));
                }
                let definitions: Vec<String> = captured
                    .rows()
                    .iter()
                    .map(|row| json_text(row.get("sql")))
                    .filter(|sql| !sql.is_empty())
                    .collect();

                log::info!(
                    "Truncating {} by recreation ({} statements)",
                    clean_identifier(table),
                    definitions.len()
                );
                self.drop_table(table).await?;
                for sql in &definitions {
                    let recreated = self.executor.execute_raw(sql).await.with_context(|| {
                        format!(
                            "Table '{}' was dropped but could not be recreated",
                            clean_identifier(table)
                        )
                    });
                    if let Err(err) = recreated {
                        log::error!("{}", ErrorChain::new(&err));
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_supported(&self, op: SchemaOp) -> Result<()> {
        match self.executor.dialect().unsupported(op) {
            Some(reason) => Err(Error::schema(self.executor.backend(), op.as_str(), reason)),
            None => Ok(()),
        }
    }

    async fn apply_key(&mut self, op: SchemaOp, table: &str, columns: &[String]) -> Result<Step> {
        self.ensure_supported(op)?;
        let dialect = self.executor.dialect();
        let ddl = match op {
            SchemaOp::PrimaryKey => dialect.add_primary_key(table, columns),
            SchemaOp::Unique => dialect.add_unique(table, columns),
            SchemaOp::Index => dialect.add_index(table, columns),
            SchemaOp::Fulltext => dialect.add_fulltext(table, columns),
            SchemaOp::ModifyColumns | SchemaOp::AutoIncrement => {
                return Err(Error::invalid_input(format!(
                    "{} does not take a column list",
                    op.as_str()
                )))
            }
        };
        self.apply(op, ddl).await
    }

    async fn auto_increment_step(&mut self, table: &str, column: &str) -> Result<Step> {
        self.ensure_supported(SchemaOp::AutoIncrement)?;

        let wanted = clean_identifier(column);
        let columns = self.describe_columns(table).await?;
        let dialect = self.executor.dialect();
        let current = columns
            .iter()
            .find(|row| json_text(row.get(dialect.column_name_key())).eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| Error::column_not_found(clean_identifier(table), wanted.clone()))?;
        let column_type = json_text(current.get(dialect.column_type_key()));

        let ddl = dialect.set_auto_increment(table, column, &column_type);
        self.apply(SchemaOp::AutoIncrement, ddl).await
    }

    async fn fulltext_step(&mut self, table: &str, columns: &[String]) -> Result<Step> {
        self.ensure_supported(SchemaOp::Fulltext)?;
        if self.has_fulltext(table, columns).await? {
            return Ok(Step::Skipped("fulltext index already present"));
        }
        self.apply_key(SchemaOp::Fulltext, table, columns).await
    }

    async fn apply(&mut self, op: SchemaOp, ddl: Ddl) -> Result<Step> {
        match ddl {
            Ddl::Execute(statements) => {
                for sql in statements {
                    log::info!("{}", sql);
                    self.executor.execute_raw(&sql).await?;
                }
                Ok(Step::Applied)
            }
            Ddl::Skip(reason) => {
                log::debug!(
                    "{} skipped on {}: {}",
                    op.as_str(),
                    self.executor.backend(),
                    reason
                );
                Ok(Step::Skipped(reason))
            }
            Ddl::Unsupported(reason) => {
                Err(Error::schema(self.executor.backend(), op.as_str(), reason))
            }
        }
    }
}

fn record(report: &mut SchemaReport, op: SchemaOp, outcome: Result<Step>) -> Result<()> {
    match outcome {
        Ok(Step::Applied) => report.applied.push(op),
        Ok(Step::Skipped(reason)) => report.skipped.push((op, reason.to_string())),
        Err(Error::Schema { reason, .. }) => {
            log::warn!("{} not applied: {}", op.as_str(), reason);
            report.unsupported.push((op, reason));
        }
        Err(other) => return Err(other),
    }
    Ok(())
}

fn field_pairs(fields: &IndexMap<String, String>) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(name, field_type)| (name.clone(), field_type.clone()))
        .collect()
}

/// Name as stored in the catalog: cleaned, without a `schema.` prefix
fn catalog_name(table: &str) -> String {
    let cleaned = clean_identifier(table);
    match cleaned.rsplit_once('.') {
        Some((_, name)) => name.to_string(),
        None => cleaned,
    }
}

fn owned<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    columns.iter().map(|c| c.as_ref().to_string()).collect()
}
