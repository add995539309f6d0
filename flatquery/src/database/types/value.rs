//! `SqlValue`, the value model shared by the query builder, the executor
//! and the MySQL/SQLite row converters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// A value bound to a placeholder or read back from a row.
///
/// The integer widths mirror what the MySQL driver reports so converters can
/// keep the exact column type; JSON input only ever produces `BigInt`,
/// `UnsignedBigInt` and `Double`.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),

    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),

    UnsignedTinyInt(u8),
    UnsignedSmallInt(u16),
    UnsignedInt(u32),
    UnsignedBigInt(u64),

    Float(f32),
    Double(f64),

    String(String),
    /// Long text columns (TEXT, CLOB)
    Text(String),
    Bytes(Vec<u8>),

    /// Expanded into one placeholder per element by IN / NOT IN
    Array(Vec<SqlValue>),
    Json(JsonValue),
    /// `YYYY-MM-DD`
    Date(String),
    /// `HH:MM:SS[.fff]`
    Time(String),
    DateTime(String),
    /// Seconds since the Unix epoch
    Timestamp(i64),
}

impl SqlValue {
    /// Build an `Array` value, used for IN / NOT IN lists
    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SqlValue>,
    {
        SqlValue::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Every integer width widened to one type; `Timestamp` counts as an integer.
    fn integer(&self) -> Option<i128> {
        Some(match *self {
            SqlValue::TinyInt(v) => v.into(),
            SqlValue::SmallInt(v) => v.into(),
            SqlValue::Int(v) => v.into(),
            SqlValue::BigInt(v) | SqlValue::Timestamp(v) => v.into(),
            SqlValue::UnsignedTinyInt(v) => v.into(),
            SqlValue::UnsignedSmallInt(v) => v.into(),
            SqlValue::UnsignedInt(v) => v.into(),
            SqlValue::UnsignedBigInt(v) => v.into(),
            _ => return None,
        })
    }

    fn float(&self) -> Option<f64> {
        match *self {
            SqlValue::Float(v) => Some(v.into()),
            SqlValue::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness with the usual textual spellings ("yes", "f", "0", ...)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::String(s) | SqlValue::Text(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "" => Some(false),
                _ => None,
            },
            other => other.as_i64().map(|i| i != 0),
        }
    }

    /// Numeric view of the value. Text is trimmed and parsed, floats truncate,
    /// unsigned values above `i64::MAX` yield `None`.
    pub fn as_i64(&self) -> Option<i64> {
        if let Some(i) = self.integer() {
            return i64::try_from(i).ok();
        }
        if let Some(f) = self.float() {
            return Some(f as i64);
        }
        match self {
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::String(s) | SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form used for string bindings. Booleans follow the driver
    /// convention of `"1"` / `""`; NULL and lists have no text form.
    pub fn as_string(&self) -> Option<String> {
        if let SqlValue::Float(f) = self {
            return Some(f.to_string());
        }
        if let Some(i) = self.integer() {
            return Some(i.to_string());
        }
        if let Some(f) = self.float() {
            return Some(f.to_string());
        }
        match self {
            SqlValue::String(s)
            | SqlValue::Text(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => Some(s.clone()),
            SqlValue::Json(j) => Some(j.to_string()),
            SqlValue::Bool(true) => Some("1".to_string()),
            SqlValue::Bool(false) => Some(String::new()),
            SqlValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Raw bytes for LOB binding; text is passed through as UTF-8
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            SqlValue::Bytes(bytes) => Some(bytes.clone()),
            other => other.as_string().map(String::into_bytes),
        }
    }

    /// Build a value from loosely-typed JSON input
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => SqlValue::BigInt(i),
                (None, Some(u)) => SqlValue::UnsignedBigInt(u),
                _ => SqlValue::Double(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => SqlValue::String(s),
            JsonValue::Array(values) => {
                SqlValue::Array(values.into_iter().map(SqlValue::from_json).collect())
            }
            object @ JsonValue::Object(_) => SqlValue::Json(object),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        if let Some(i) = self.integer() {
            return i64::try_from(i)
                .map(JsonValue::from)
                .or_else(|_| u64::try_from(i).map(JsonValue::from))
                .unwrap_or(JsonValue::Null);
        }
        if let Some(f) = self.float() {
            return serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number);
        }
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Json(j) => j.clone(),
            SqlValue::Array(values) => JsonValue::Array(values.iter().map(Self::to_json).collect()),
            other => other.as_string().map_or(JsonValue::Null, JsonValue::String),
        }
    }

    /// SQL literal form, only for debug output and never executed
    pub fn to_sql_string(&self) -> String {
        let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => u8::from(*b).to_string(),
            SqlValue::String(s)
            | SqlValue::Text(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => quote(s.as_str()),
            SqlValue::Json(json) => quote(&json.to_string()),
            SqlValue::Bytes(bytes) => format!("X'{}'", hex_encode(bytes)),
            SqlValue::Array(values) => {
                let elements: Vec<String> = values.iter().map(Self::to_sql_string).collect();
                format!("({})", elements.join(", "))
            }
            number => number.as_string().unwrap_or_default(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Bytes(b) => write!(f, "<binary:{} bytes>", b.len()),
            SqlValue::Array(values) => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            other => f.write_str(&other.as_string().unwrap_or_default()),
        }
    }
}

// Values travel through QuerySpec dumps and JSON input as plain scalars
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(SqlValue::from_json)
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

macro_rules! sql_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for SqlValue {
                fn from(v: $source) -> Self {
                    SqlValue::$variant(v)
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => UnsignedTinyInt,
    u16 => UnsignedSmallInt,
    u32 => UnsignedInt,
    u64 => UnsignedBigInt,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    JsonValue => Json,
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl From<chrono::NaiveDate> for SqlValue {
    fn from(date: chrono::NaiveDate) -> Self {
        SqlValue::Date(date.format("%Y-%m-%d").to_string())
    }
}

impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(dt: chrono::NaiveDateTime) -> Self {
        SqlValue::DateTime(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}
