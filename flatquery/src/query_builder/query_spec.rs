//! Flat query description consumed by the builder
//!
//! A `QuerySpec` mirrors the loosely-typed parameter maps callers pass around:
//! it deserializes from a flat JSON object and tolerates missing or oddly
//! shaped keys instead of rejecting them.

use crate::database::types::SqlValue;
use crate::error::Result;
use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// Ordered column → condition map
pub type WhereClause = IndexMap<String, Condition>;

/// Structured query description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert: Option<ActionTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<ActionTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<ActionTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<ActionTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<ActionTarget>,

    #[serde(deserialize_with = "deserialize_select", skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<SelectItem>,
    #[serde(deserialize_with = "deserialize_names", skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub set: IndexMap<String, SqlValue>,
    #[serde(rename = "where", skip_serializing_if = "IndexMap::is_empty")]
    pub where_and: WhereClause,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub where_or: WhereClause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSpec>,
    #[serde(deserialize_with = "deserialize_names", skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
}

/// The statement kind a spec resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Insert,
    Replace,
    Update,
    Count,
    Delete,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object
    pub fn from_json(value: JsonValue) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Resolve the honored action: insert > replace > update > count > delete
    pub fn action(&self) -> Action {
        let is_set = |target: &Option<ActionTarget>| target.as_ref().is_some_and(|t| t.is_set());

        if is_set(&self.insert) {
            Action::Insert
        } else if is_set(&self.replace) {
            Action::Replace
        } else if is_set(&self.update) {
            Action::Update
        } else if is_set(&self.count) {
            Action::Count
        } else if is_set(&self.delete) {
            Action::Delete
        } else {
            Action::Select
        }
    }

    /// Tables the statement targets: the action's own table list, else `from`
    pub fn tables(&self) -> &[String] {
        let target = match self.action() {
            Action::Insert => self.insert.as_ref(),
            Action::Replace => self.replace.as_ref(),
            Action::Update => self.update.as_ref(),
            Action::Count => self.count.as_ref(),
            Action::Delete => self.delete.as_ref(),
            Action::Select => None,
        };
        match target {
            Some(ActionTarget::Tables(tables)) if !tables.is_empty() => tables,
            _ => &self.from,
        }
    }

    /// JSON dump used in execution errors and event payloads
    pub fn dump(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Value of an action key: a flag (tables come from `from`) or the tables themselves
#[derive(Debug, Clone, PartialEq)]
pub enum ActionTarget {
    Flag(bool),
    Tables(Vec<String>),
}

impl ActionTarget {
    pub fn table(name: impl Into<String>) -> Self {
        ActionTarget::Tables(vec![name.into()])
    }

    pub fn is_set(&self) -> bool {
        match self {
            ActionTarget::Flag(flag) => *flag,
            ActionTarget::Tables(tables) => !tables.is_empty(),
        }
    }
}

impl Serialize for ActionTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ActionTarget::Flag(flag) => serializer.serialize_bool(*flag),
            ActionTarget::Tables(tables) if tables.len() == 1 => tables[0].serialize(serializer),
            ActionTarget::Tables(tables) => tables.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ActionTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(match value {
            JsonValue::Null => ActionTarget::Flag(false),
            JsonValue::Bool(flag) => ActionTarget::Flag(flag),
            JsonValue::Number(n) => ActionTarget::Flag(n.as_f64().is_some_and(|f| f != 0.0)),
            other @ (JsonValue::String(_) | JsonValue::Array(_)) => {
                ActionTarget::Tables(json_names(other))
            }
            JsonValue::Object(_) => ActionTarget::Flag(true),
        })
    }
}

/// One SELECT projection item
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Field(String),
    /// `FUNCTION(field1, field2) [AS alias]`
    Function {
        function: String,
        fields: Vec<String>,
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn field(name: impl Into<String>) -> Self {
        SelectItem::Field(name.into())
    }

    pub fn function(function: impl Into<String>, field: impl Into<String>) -> Self {
        SelectItem::Function {
            function: function.into(),
            fields: vec![field.into()],
            alias: None,
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        match self {
            SelectItem::Function {
                function, fields, ..
            } => SelectItem::Function {
                function,
                fields,
                alias: Some(alias.into()),
            },
            field => field,
        }
    }

    fn from_json(value: JsonValue) -> Vec<SelectItem> {
        match value {
            JsonValue::Object(mut map) => {
                let fields = map.remove("field").map(json_names).unwrap_or_default();
                let function = map
                    .remove("function")
                    .and_then(|f| f.as_str().map(str::to_string))
                    .filter(|f| !f.trim().is_empty());
                match function {
                    Some(function) => vec![SelectItem::Function {
                        function,
                        fields,
                        alias: map
                            .remove("alias")
                            .and_then(|a| a.as_str().map(str::to_string)),
                    }],
                    None => fields.into_iter().map(SelectItem::Field).collect(),
                }
            }
            JsonValue::Array(items) => items.into_iter().flat_map(SelectItem::from_json).collect(),
            other => json_names(other).into_iter().map(SelectItem::Field).collect(),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            SelectItem::Field(name) => JsonValue::String(name.clone()),
            SelectItem::Function {
                function,
                fields,
                alias,
            } => {
                let mut obj = json!({ "function": function, "field": fields });
                if let Some(alias) = alias {
                    obj["alias"] = JsonValue::String(alias.clone());
                }
                obj
            }
        }
    }
}

impl Serialize for SelectItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// WHERE operator; unknown operator names degrade to equality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Not,
    Regexp,
    In,
    NotIn,
    /// `LIKE` with the value used as-is
    Like,
    /// `%LIKE%`
    Contains,
    /// `%LIKE`
    EndsWith,
    /// `LIKE%`
    StartsWith,
    NotLike,
    NotContains,
    NotEndsWith,
    NotStartsWith,
}

impl Operator {
    /// Lenient parse used for JSON input
    pub fn parse(name: &str) -> Self {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        match normalized.as_str() {
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "NOT" | "!=" | "<>" => Operator::Not,
            "REGEXP" => Operator::Regexp,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "LIKE" => Operator::Like,
            "%LIKE%" => Operator::Contains,
            "%LIKE" => Operator::EndsWith,
            "LIKE%" => Operator::StartsWith,
            "NOT LIKE" => Operator::NotLike,
            "NOT %LIKE%" => Operator::NotContains,
            "NOT %LIKE" => Operator::NotEndsWith,
            "NOT LIKE%" => Operator::NotStartsWith,
            _ => Operator::Eq,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Not => "NOT",
            Operator::Regexp => "REGEXP",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::Contains => "%LIKE%",
            Operator::EndsWith => "%LIKE",
            Operator::StartsWith => "LIKE%",
            Operator::NotLike => "NOT LIKE",
            Operator::NotContains => "NOT %LIKE%",
            Operator::NotEndsWith => "NOT %LIKE",
            Operator::NotStartsWith => "NOT LIKE%",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        Operator::parse(name)
    }
}

/// Right-hand side of a WHERE entry
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `IS NULL`
    Null,
    /// Equality against a value
    Value(SqlValue),
    /// `{type, value}` descriptor
    Op { op: Operator, value: SqlValue },
}

impl Condition {
    pub fn eq(value: impl Into<SqlValue>) -> Self {
        Condition::Value(value.into())
    }

    pub fn op(op: impl Into<Operator>, value: impl Into<SqlValue>) -> Self {
        Condition::Op {
            op: op.into(),
            value: value.into(),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Condition::Null => serializer.serialize_none(),
            Condition::Value(value) => value.serialize(serializer),
            Condition::Op { op, value } => {
                json!({ "type": op.as_str(), "value": value.to_json() }).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(match value {
            JsonValue::Null => Condition::Null,
            JsonValue::Object(mut map) if map.contains_key("type") => {
                let op = map
                    .get("type")
                    .and_then(JsonValue::as_str)
                    .map(Operator::parse)
                    .unwrap_or(Operator::Eq);
                let value = map
                    .remove("value")
                    .map(SqlValue::from_json)
                    .unwrap_or(SqlValue::Null);
                Condition::Op { op, value }
            }
            other => Condition::Value(SqlValue::from_json(other)),
        })
    }
}

/// ORDER BY description
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    /// `"field ASC, field2 DESC"`
    Raw(String),
    /// Plain field names, no direction
    Fields(Vec<String>),
    Entries(Vec<OrderEntry>),
}

/// Structured ORDER BY entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub sort: SortDirection,
}

impl OrderEntry {
    pub fn field(field: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            field: Some(field.into()),
            function: None,
            sort,
        }
    }

    /// `RAND()` / `RANDOM()` depending on the dialect
    pub fn random() -> Self {
        Self {
            field: None,
            function: Some("RAND".to_string()),
            sort: SortDirection::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    Unspecified,
}

impl SortDirection {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            _ => SortDirection::Unspecified,
        }
    }

    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            SortDirection::Asc => Some("ASC"),
            SortDirection::Desc => Some("DESC"),
            SortDirection::Unspecified => None,
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.keyword().unwrap_or(""))
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(SortDirection::parse)
            .unwrap_or_default())
    }
}

impl Serialize for OrderSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OrderSpec::Raw(raw) => serializer.serialize_str(raw),
            OrderSpec::Fields(fields) => fields.serialize(serializer),
            OrderSpec::Entries(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OrderSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(match value {
            JsonValue::String(raw) => OrderSpec::Raw(raw),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
                OrderSpec::Fields(json_names(JsonValue::Array(items)))
            }
            JsonValue::Array(items) => OrderSpec::Entries(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        JsonValue::String(field) => {
                            Some(OrderEntry::field(field, SortDirection::Unspecified))
                        }
                        other => serde_json::from_value(other).ok(),
                    })
                    .collect(),
            ),
            object @ JsonValue::Object(_) => OrderSpec::Entries(
                serde_json::from_value(object).map(|e| vec![e]).unwrap_or_default(),
            ),
            _ => OrderSpec::Raw(String::new()),
        })
    }
}

/// LIMIT in its textual form: `"n"` or `"offset,count"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Limit(pub String);

impl Limit {
    /// Parsed, clamped values: empty, one or two entries
    pub fn values(&self) -> Vec<i64> {
        let text = self.0.trim();
        if text.is_empty() {
            return Vec::new();
        }
        text.splitn(2, ',').map(lenient_non_negative).collect()
    }
}

/// Leading (optionally signed) digits, anything else is 0; negatives clamp to 0
fn lenient_non_negative(part: &str) -> i64 {
    let part = part.trim();
    let (negative, digits) = match part.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, part.strip_prefix('+').unwrap_or(part)),
    };
    let leading: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value = leading.parse::<i64>().unwrap_or(if leading.is_empty() { 0 } else { i64::MAX });
    if negative {
        0
    } else {
        value
    }
}

impl From<&str> for Limit {
    fn from(text: &str) -> Self {
        Limit(text.to_string())
    }
}

impl From<String> for Limit {
    fn from(text: String) -> Self {
        Limit(text)
    }
}

impl From<i64> for Limit {
    fn from(count: i64) -> Self {
        Limit(count.to_string())
    }
}

impl From<(i64, i64)> for Limit {
    fn from((offset, count): (i64, i64)) -> Self {
        Limit(format!("{},{}", offset, count))
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(Limit(match value {
            JsonValue::String(text) => text,
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        }))
    }
}

/// Names from a string, a comma list or an array; non-string scalars are stringified
fn json_names(value: JsonValue) -> Vec<String> {
    match value {
        JsonValue::Null => Vec::new(),
        JsonValue::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        JsonValue::Array(items) => items.into_iter().flat_map(json_names).collect(),
        JsonValue::Bool(_) | JsonValue::Object(_) => Vec::new(),
        number => vec![number.to_string()],
    }
}

fn deserialize_names<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    JsonValue::deserialize(deserializer).map(json_names)
}

fn deserialize_select<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<SelectItem>, D::Error> {
    JsonValue::deserialize(deserializer).map(SelectItem::from_json)
}
