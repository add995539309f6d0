//! SQLite row extraction and parameter binding

use super::converter::json_float;
use crate::database::statement::Row;
use crate::error::{Error, Result};
use crate::query_builder::{Binding, ParamType};
use serde_json::Value as JsonValue;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};

/// SQLite type converter
#[derive(Clone, Default)]
pub struct SqliteTypeConverter;

/// Storage class of a stored value (https://www.sqlite.org/datatype3.html)
#[derive(Debug, Clone, Copy, PartialEq)]
enum StorageClass {
    Integer,
    Real,
    Text,
    Blob,
    Null,
}

impl StorageClass {
    fn from_type_name(name: &str) -> Self {
        match name {
            "INTEGER" | "BOOLEAN" | "INT8" => StorageClass::Integer,
            "REAL" => StorageClass::Real,
            "BLOB" => StorageClass::Blob,
            "NULL" => StorageClass::Null,
            // DATE/DATETIME/TIME and anything unknown is read back as text
            _ => StorageClass::Text,
        }
    }
}

impl SqliteTypeConverter {
    /// Convert a driver row into an ordered column map
    pub fn row_to_map(row: &SqliteRow) -> Result<Row> {
        let mut map = Row::with_capacity(row.columns().len());
        for (index, column) in row.columns().iter().enumerate() {
            let value = Self::extract_column(row, index)?;
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }

    // Values are decoded by what is actually stored, not by the declared
    // column type: SQLite columns are only an affinity hint.
    fn extract_column(row: &SqliteRow, index: usize) -> Result<JsonValue> {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| Error::from_driver(e, format!("column #{}", index)))?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let class = StorageClass::from_type_name(raw.type_info().name());

        let value = match class {
            StorageClass::Null => Some(JsonValue::Null),
            StorageClass::Integer => row.try_get_unchecked::<i64, _>(index).ok().map(JsonValue::from),
            StorageClass::Real => row.try_get_unchecked::<f64, _>(index).ok().map(json_float),
            StorageClass::Text => row
                .try_get_unchecked::<String, _>(index)
                .ok()
                .map(JsonValue::String),
            StorageClass::Blob => row
                .try_get_unchecked::<Vec<u8>, _>(index)
                .ok()
                .map(|bytes| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())),
        };

        Ok(value.unwrap_or_else(|| {
            log::warn!(
                "Could not decode SQLite column {} stored as {:?}, returning null",
                index,
                class
            );
            JsonValue::Null
        }))
    }

    /// Bind one value to a SQLite query according to its parameter type
    pub fn bind_param<'q>(
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        binding: &Binding,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match binding.param_type {
            ParamType::Null => query.bind(None::<String>),
            ParamType::Int => query.bind(binding.value.as_i64()),
            // SQLite stores booleans as integers
            ParamType::Bool => query.bind(binding.value.as_bool().map(i64::from)),
            ParamType::Lob => query.bind(binding.value.as_bytes()),
            ParamType::Str => query.bind(binding.value.as_string()),
        }
    }
}
