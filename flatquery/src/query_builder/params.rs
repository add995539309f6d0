//! Named parameter bindings and placeholder allocation

use crate::database::types::SqlValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a bound value is handed to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Bound as text (the default for plain values)
    #[default]
    Str,
    /// Bound as a 64-bit integer
    Int,
    Bool,
    Null,
    /// Bound as raw bytes
    Lob,
}

/// A value with its binding type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub value: SqlValue,
    #[serde(default)]
    pub param_type: ParamType,
}

impl Binding {
    /// String-typed binding
    pub fn new(value: impl Into<SqlValue>) -> Self {
        Self::typed(value, ParamType::Str)
    }

    pub fn typed(value: impl Into<SqlValue>, param_type: ParamType) -> Self {
        Self {
            value: value.into(),
            param_type,
        }
    }

    /// Integer-typed binding
    pub fn int(value: i64) -> Self {
        Self::typed(SqlValue::BigInt(value), ParamType::Int)
    }
}

/// Named bindings in allocation order
pub type Bindings = IndexMap<String, Binding>;

/// Clause-specific placeholder prefixes
pub(crate) mod prefix {
    pub const SET: &str = "setv";
    pub const WHERE: &str = "wherev";
    pub const OR: &str = "or";
    pub const IN: &str = "in";
    pub const NOT_IN: &str = "notin";
    pub const LIMIT: &str = "limit";
}

/// Hands out unique placeholder names for one build.
///
/// Every issued name is remembered, so two clauses can never produce the same
/// placeholder even if a prefix/counter pair would collide.
#[derive(Debug, Default)]
pub struct ParamAllocator {
    issued: HashSet<String>,
    counters: HashMap<&'static str, usize>,
    bindings: Bindings,
}

impl ParamAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free `{prefix}{n}` name (n starts at 1)
    pub fn next_name(&mut self, prefix: &'static str) -> String {
        let counter = self.counters.entry(prefix).or_insert(0);
        loop {
            *counter += 1;
            let name = format!("{}{}", prefix, counter);
            if self.issued.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Bind a value under a fresh name and return its `:name` placeholder
    pub fn bind(&mut self, prefix: &'static str, binding: Binding) -> String {
        let name = self.next_name(prefix);
        let placeholder = format!(":{}", name);
        self.bindings.insert(name, binding);
        placeholder
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn into_bindings(self) -> Bindings {
        self.bindings
    }
}
