//! Buffered statement results

use crate::error::Result;
use crate::query_builder::Bindings;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// One result row, columns in select order
pub type Row = IndexMap<String, JsonValue>;

/// Shape of the rows returned by [`Statement::fetch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStyle {
    /// Column name keys
    #[default]
    Assoc,
    /// Column name keys followed by numeric index keys ("0", "1", ...)
    Both,
    Bound,
    Class,
    Object,
}

impl FetchStyle {
    /// Lenient parse: unknown names fall back to `Assoc`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "both" => FetchStyle::Both,
            "bound" => FetchStyle::Bound,
            "class" => FetchStyle::Class,
            "object" | "obj" => FetchStyle::Object,
            _ => FetchStyle::Assoc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStyle::Assoc => "assoc",
            FetchStyle::Both => "both",
            FetchStyle::Bound => "bound",
            FetchStyle::Class => "class",
            FetchStyle::Object => "object",
        }
    }

    /// Reshape a row for this style
    pub fn apply(&self, row: &Row) -> Row {
        match self {
            FetchStyle::Both => {
                let mut out = row.clone();
                for (index, value) in row.values().enumerate() {
                    out.insert(index.to_string(), value.clone());
                }
                out
            }
            _ => row.clone(),
        }
    }
}

impl FromStr for FetchStyle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for FetchStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one executed statement
///
/// Rows are fully buffered when the statement returns, so the driver cursor
/// is already released and the handle can be kept as long as needed.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    sql: String,
    bindings: Bindings,
    rows: Vec<Row>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl Statement {
    pub(crate) fn new(
        sql: String,
        bindings: Bindings,
        rows: Vec<Row>,
        rows_affected: u64,
        last_insert_id: Option<i64>,
    ) -> Self {
        Self {
            sql,
            bindings,
            rows,
            rows_affected,
            last_insert_id,
        }
    }

    /// SQL as sent to the driver, with named placeholders
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Rows changed by a write; 0 for reads
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Number of buffered rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn fetch(&self, style: FetchStyle) -> Vec<Row> {
        self.rows.iter().map(|row| style.apply(row)).collect()
    }

    pub fn fetch_one(&self) -> Option<Row> {
        self.rows.first().cloned()
    }

    /// Value at `index` of every row, `Null` where a row is shorter
    pub fn fetch_column(&self, index: usize) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| {
                row.get_index(index)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(JsonValue::Null)
            })
            .collect()
    }

    /// Deserialize every row into `T`
    pub fn fetch_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, JsonValue> =
                    row.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                Ok(serde_json::from_value(JsonValue::Object(object))?)
            })
            .collect()
    }
}
