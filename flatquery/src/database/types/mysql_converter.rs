//! MySQL row extraction and parameter binding

use super::converter::json_float;
use crate::database::statement::Row;
use crate::error::{Error, Result};
use crate::query_builder::{Binding, ParamType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo, ValueRef};

/// MySQL type converter
#[derive(Clone, Default)]
pub struct MySqlTypeConverter;

impl MySqlTypeConverter {
    /// Convert a driver row into an ordered column map
    pub fn row_to_map(row: &MySqlRow) -> Result<Row> {
        let mut map = Row::with_capacity(row.columns().len());
        for (index, column) in row.columns().iter().enumerate() {
            let value = Self::extract_column(row, index)?;
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }

    fn extract_column(row: &MySqlRow, index: usize) -> Result<JsonValue> {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| Error::from_driver(e, format!("column #{}", index)))?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }

        let type_name = row.columns()[index].type_info().name().to_string();
        log::trace!("Extracting MySQL column {} of type '{}'", index, type_name);

        let value = match type_name.as_str() {
            // TINYINT(1) is reported as BOOLEAN, keep it numeric like the server does
            "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
                .try_get::<i64, _>(index)
                .ok()
                .or_else(|| row.try_get::<bool, _>(index).ok().map(i64::from))
                .map(JsonValue::from),
            name if name.ends_with("UNSIGNED") => {
                row.try_get::<u64, _>(index).ok().map(JsonValue::from)
            }
            "FLOAT" => row
                .try_get::<f32, _>(index)
                .ok()
                .map(|f| json_float(f as f64)),
            "DOUBLE" | "REAL" => row.try_get::<f64, _>(index).ok().map(json_float),
            "JSON" => row.try_get::<JsonValue, _>(index).ok(),
            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .ok()
                .map(|d| JsonValue::String(d.to_string())),
            "TIME" => row
                .try_get::<NaiveTime, _>(index)
                .ok()
                .map(|t| JsonValue::String(t.to_string())),
            "DATETIME" => row
                .try_get::<NaiveDateTime, _>(index)
                .ok()
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
            "TIMESTAMP" => row
                .try_get::<DateTime<Utc>, _>(index)
                .ok()
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
                .try_get::<Vec<u8>, _>(index)
                .ok()
                .map(|bytes| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())),
            _ => row.try_get::<String, _>(index).ok().map(JsonValue::String),
        };

        match value {
            Some(value) => Ok(value),
            None => Self::extract_fallback(row, index, &type_name),
        }
    }

    // DECIMAL, catalog columns with binary collation and anything the typed
    // decoders refuse arrive here as raw text
    fn extract_fallback(row: &MySqlRow, index: usize, type_name: &str) -> Result<JsonValue> {
        if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
            return Ok(JsonValue::String(text));
        }
        if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(index) {
            return Ok(JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()));
        }

        log::warn!(
            "Could not decode MySQL column {} of type '{}', returning null",
            index,
            type_name
        );
        Ok(JsonValue::Null)
    }

    /// Bind one value to a MySQL query according to its parameter type
    pub fn bind_param<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        binding: &Binding,
    ) -> Query<'q, MySql, MySqlArguments> {
        match binding.param_type {
            ParamType::Null => query.bind(None::<String>),
            ParamType::Int => query.bind(binding.value.as_i64()),
            ParamType::Bool => query.bind(binding.value.as_bool()),
            ParamType::Lob => query.bind(binding.value.as_bytes()),
            ParamType::Str => query.bind(binding.value.as_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::SqlValue;

    // Binding must never panic, whatever the value shape
    #[test]
    fn test_bind_param_accepts_every_param_type() {
        let bindings = [
            Binding::new(SqlValue::from("text")),
            Binding::int(5),
            Binding::typed(SqlValue::Bool(true), ParamType::Bool),
            Binding::typed(SqlValue::Bytes(vec![1, 2]), ParamType::Lob),
            Binding::typed(SqlValue::Null, ParamType::Null),
            Binding::new(SqlValue::list([1i32, 2])),
        ];

        let mut query = sqlx::query::<MySql>("SELECT ?, ?, ?, ?, ?, ?");
        for binding in &bindings {
            query = MySqlTypeConverter::bind_param(query, binding);
        }
        assert_eq!(sqlx::Execute::sql(&query), "SELECT ?, ?, ?, ?, ?, ?");
    }
}
