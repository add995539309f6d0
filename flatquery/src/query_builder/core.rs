//! Core query building logic
//!
//! Translates a `QuerySpec` into SQL text with `:name` placeholders plus the
//! matching named bindings. Building never fails: malformed input is coerced
//! or dropped rather than rejected.

use super::dialects::{create_dialect, SqlDialect};
use super::identifier::{quote_identifier, sanitize_order_function, sanitize_select_function};
use super::params::{prefix, Binding, Bindings, ParamAllocator};
use super::query_spec::{
    Action, Condition, OrderEntry, OrderSpec, Operator, QuerySpec, SelectItem, WhereClause,
};
use crate::database::types::{DatabaseBackend, SqlValue};

/// SQL text with named placeholders and their bindings
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub bindings: Bindings,
}

impl BuiltQuery {
    /// Raw SQL without bindings
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Bindings::new(),
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    /// Rewrite `:name` placeholders to `?` and list bindings in textual order.
    ///
    /// Quoted strings and backticked identifiers are copied untouched. A
    /// `:word` with no matching binding is left as written.
    pub fn positional(&self) -> (String, Vec<Binding>) {
        let mut sql = String::with_capacity(self.sql.len());
        let mut ordered = Vec::with_capacity(self.bindings.len());
        self.scan_placeholders(|segment| match segment {
            Segment::Text(text) => sql.push_str(text),
            Segment::Placeholder(_, binding) => {
                sql.push('?');
                ordered.push(binding.clone());
            }
        });
        (sql, ordered)
    }

    /// SQL with bindings substituted as literals. For logs only, never execute it.
    pub fn interpolated(&self) -> String {
        let mut sql = String::with_capacity(self.sql.len());
        self.scan_placeholders(|segment| match segment {
            Segment::Text(text) => sql.push_str(text),
            Segment::Placeholder(_, binding) => sql.push_str(&binding.value.to_sql_string()),
        });
        sql
    }

    /// Names of the placeholders in the order they appear in the SQL
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.scan_placeholders(|segment| {
            if let Segment::Placeholder(name, _) = segment {
                names.push(name.to_string());
            }
        });
        names
    }

    fn scan_placeholders<'a>(&'a self, mut visit: impl FnMut(Segment<'a>)) {
        let bytes = self.sql.as_bytes();
        let mut start = 0;
        let mut i = 0;
        let mut quote: Option<u8> = None;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match b {
                b'\'' | b'"' | b'`' => {
                    quote = Some(b);
                    i += 1;
                }
                b':' => {
                    let name_end = bytes[i + 1..]
                        .iter()
                        .position(|c| !(c.is_ascii_alphanumeric() || *c == b'_'))
                        .map(|p| i + 1 + p)
                        .unwrap_or(bytes.len());
                    let name = &self.sql[i + 1..name_end];
                    match self.bindings.get(name) {
                        Some(binding) if !name.is_empty() => {
                            visit(Segment::Text(&self.sql[start..i]));
                            visit(Segment::Placeholder(name, binding));
                            start = name_end;
                            i = name_end;
                        }
                        _ => i += 1,
                    }
                }
                _ => i += 1,
            }
        }
        visit(Segment::Text(&self.sql[start..]));
    }
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str, &'a Binding),
}

/// Builds SQL for one dialect
pub struct QueryBuilder {
    dialect: Box<dyn SqlDialect>,
}

impl QueryBuilder {
    /// Create a new query builder for the specified database backend
    pub fn new(backend: DatabaseBackend) -> Self {
        Self {
            dialect: create_dialect(backend),
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.dialect.backend()
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Build SQL and bindings for a spec
    pub fn build(&self, spec: &QuerySpec) -> BuiltQuery {
        let mut params = ParamAllocator::new();
        let action = spec.action();
        let tables = table_list(spec.tables());

        let mut sql = match action {
            Action::Insert | Action::Replace => {
                let verb = if action == Action::Insert {
                    "INSERT"
                } else {
                    "REPLACE"
                };
                let (columns, values) = self.values_clause(spec, &mut params);
                format!(
                    "{} INTO {} ({}) VALUES ({})",
                    verb,
                    tables,
                    columns.join(", "),
                    values.join(", ")
                )
            }
            Action::Update => {
                let assignments = self.set_clause(spec, &mut params);
                format!("UPDATE {} SET {}", tables, assignments.join(", "))
            }
            Action::Delete => format!("DELETE FROM {}", tables),
            Action::Count => format!("SELECT COUNT(*) AS `count` FROM {}", tables),
            Action::Select => format!("SELECT {} FROM {}", self.select_clause(spec), tables),
        };

        if !matches!(action, Action::Insert | Action::Replace) {
            sql.push_str(&self.where_clause(spec, &mut params));
            sql.push_str(&self.group_clause(spec));
            sql.push_str(&self.order_clause(spec));
            sql.push_str(&self.limit_clause(spec, &mut params));
        }

        BuiltQuery {
            sql,
            bindings: params.into_bindings(),
        }
    }

    fn select_clause(&self, spec: &QuerySpec) -> String {
        let items: Vec<String> = spec
            .select
            .iter()
            .filter_map(|item| match item {
                SelectItem::Field(field) => Some(quote_identifier(field)),
                SelectItem::Function {
                    function,
                    fields,
                    alias,
                } => {
                    let function = sanitize_select_function(function);
                    if function.is_empty() {
                        return None;
                    }
                    let args = fields
                        .iter()
                        .map(|f| quote_identifier(f))
                        .filter(|f| !f.is_empty())
                        .collect::<Vec<_>>()
                        .join(", ");
                    let mut expr = format!("{}({})", function, args);
                    if let Some(alias) = alias.as_deref().map(quote_identifier) {
                        if !alias.is_empty() {
                            expr.push_str(" AS ");
                            expr.push_str(&alias);
                        }
                    }
                    Some(expr)
                }
            })
            .filter(|item| !item.is_empty())
            .collect();

        if items.is_empty() {
            "*".to_string()
        } else {
            items.join(", ")
        }
    }

    fn values_clause(
        &self,
        spec: &QuerySpec,
        params: &mut ParamAllocator,
    ) -> (Vec<String>, Vec<String>) {
        spec.set
            .iter()
            .map(|(column, value)| {
                (
                    quote_identifier(column),
                    bind_set_value(value, params),
                )
            })
            .unzip()
    }

    fn set_clause(&self, spec: &QuerySpec, params: &mut ParamAllocator) -> Vec<String> {
        spec.set
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    quote_identifier(column),
                    bind_set_value(value, params)
                )
            })
            .collect()
    }

    fn where_clause(&self, spec: &QuerySpec, params: &mut ParamAllocator) -> String {
        let and_part = conditions(&spec.where_and, prefix::WHERE, params).join(" AND ");
        let or_part = conditions(&spec.where_or, prefix::OR, params).join(" OR ");

        match (and_part.is_empty(), or_part.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!(" WHERE {}", and_part),
            (true, false) => format!(" WHERE {}", or_part),
            (false, false) => format!(" WHERE ({}) AND ({})", and_part, or_part),
        }
    }

    fn group_clause(&self, spec: &QuerySpec) -> String {
        let fields: Vec<String> = spec
            .group
            .iter()
            .map(|f| quote_identifier(f))
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            String::new()
        } else {
            format!(" GROUP BY {}", fields.join(", "))
        }
    }

    fn order_clause(&self, spec: &QuerySpec) -> String {
        let terms: Vec<String> = match &spec.order {
            None => Vec::new(),
            Some(OrderSpec::Raw(raw)) => raw.split(',').filter_map(raw_order_term).collect(),
            Some(OrderSpec::Fields(fields)) => fields
                .iter()
                .map(|f| quote_identifier(f))
                .filter(|f| !f.is_empty())
                .collect(),
            Some(OrderSpec::Entries(entries)) => entries
                .iter()
                .filter_map(|entry| self.order_entry(entry))
                .collect(),
        };

        if terms.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", terms.join(", "))
        }
    }

    fn order_entry(&self, entry: &OrderEntry) -> Option<String> {
        let field = entry
            .field
            .as_deref()
            .map(quote_identifier)
            .unwrap_or_default();
        let function = entry
            .function
            .as_deref()
            .map(sanitize_order_function)
            .unwrap_or_default();

        let mut term = if !function.is_empty() {
            if is_random_function(&function) {
                self.dialect.random_function().to_string()
            } else {
                format!("{}({})", function, field)
            }
        } else if !field.is_empty() {
            field
        } else {
            return None;
        };

        if let Some(keyword) = entry.sort.keyword() {
            term.push(' ');
            term.push_str(keyword);
        }
        Some(term)
    }

    fn limit_clause(&self, spec: &QuerySpec, params: &mut ParamAllocator) -> String {
        let values = spec.limit.as_ref().map(|l| l.values()).unwrap_or_default();
        if values.is_empty() {
            return String::new();
        }

        let placeholders: Vec<String> = values
            .into_iter()
            .map(|value| params.bind(prefix::LIMIT, Binding::int(value)))
            .collect();
        format!(" LIMIT {}", placeholders.join(", "))
    }
}

fn table_list(tables: &[String]) -> String {
    tables
        .iter()
        .map(|t| quote_identifier(t))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_set_value(value: &SqlValue, params: &mut ParamAllocator) -> String {
    if value.is_null() {
        "NULL".to_string()
    } else {
        params.bind(prefix::SET, Binding::new(value.clone()))
    }
}

fn is_random_function(name: &str) -> bool {
    name.eq_ignore_ascii_case("RAND") || name.eq_ignore_ascii_case("RANDOM")
}

/// `field [ASC|DESC]` from the raw string form
fn raw_order_term(part: &str) -> Option<String> {
    let part = part.trim();
    let upper = part.to_ascii_uppercase();
    let (field, keyword) = if upper.ends_with(" DESC") {
        (&part[..part.len() - 4], Some("DESC"))
    } else if upper.ends_with(" ASC") {
        (&part[..part.len() - 3], Some("ASC"))
    } else {
        (part, None)
    };

    let field = quote_identifier(field.trim());
    if field.is_empty() {
        return None;
    }
    Some(match keyword {
        Some(keyword) => format!("{} {}", field, keyword),
        None => field,
    })
}

/// Render every entry of a WHERE map, in insertion order
fn conditions(clause: &WhereClause, value_prefix: &'static str, params: &mut ParamAllocator) -> Vec<String> {
    clause
        .iter()
        .filter_map(|(column, condition)| {
            let column = quote_identifier(column);
            if column.is_empty() {
                return None;
            }
            Some(match condition {
                Condition::Null => format!("{} IS NULL", column),
                Condition::Value(SqlValue::Null) => format!("{} IS NULL", column),
                Condition::Value(value @ SqlValue::Array(_)) => {
                    membership(&column, Operator::In, value, params)
                }
                Condition::Value(value) => comparison(&column, "=", value, value_prefix, params),
                Condition::Op { op, value } => match op {
                    Operator::In | Operator::NotIn => membership(&column, *op, value, params),
                    Operator::Eq if value.is_null() => format!("{} IS NULL", column),
                    Operator::Not if value.is_null() => format!("{} IS NOT NULL", column),
                    Operator::Eq => comparison(&column, "=", value, value_prefix, params),
                    Operator::Lt => comparison(&column, "<", value, value_prefix, params),
                    Operator::Gt => comparison(&column, ">", value, value_prefix, params),
                    Operator::Le => comparison(&column, "<=", value, value_prefix, params),
                    Operator::Ge => comparison(&column, ">=", value, value_prefix, params),
                    Operator::Not => comparison(&column, "!=", value, value_prefix, params),
                    Operator::Regexp => comparison(&column, "REGEXP", value, value_prefix, params),
                    like => pattern(&column, *like, value, value_prefix, params),
                },
            })
        })
        .collect()
}

/// A string containing a backtick is a column reference written into the SQL
/// as-is. Only developer-controlled values may take this path: it is a direct
/// injection surface for caller input.
fn raw_column_reference(value: &SqlValue) -> Option<&str> {
    match value {
        SqlValue::String(s) | SqlValue::Text(s) if s.contains('`') => Some(s.as_str()),
        _ => None,
    }
}

fn comparison(
    column: &str,
    operator: &str,
    value: &SqlValue,
    value_prefix: &'static str,
    params: &mut ParamAllocator,
) -> String {
    let rhs = match raw_column_reference(value) {
        Some(raw) => raw.to_string(),
        None => params.bind(value_prefix, Binding::new(value.clone())),
    };
    format!("{} {} {}", column, operator, rhs)
}

fn membership(
    column: &str,
    op: Operator,
    value: &SqlValue,
    params: &mut ParamAllocator,
) -> String {
    let (keyword, value_prefix) = match op {
        Operator::NotIn => ("NOT IN", prefix::NOT_IN),
        _ => ("IN", prefix::IN),
    };
    let items: Vec<SqlValue> = match value {
        SqlValue::Array(items) => items.clone(),
        scalar => vec![scalar.clone()],
    };

    // An empty list matches nothing (IN) or everything (NOT IN)
    if items.is_empty() {
        return match op {
            Operator::NotIn => "1 = 1".to_string(),
            _ => "1 = 0".to_string(),
        };
    }

    let placeholders: Vec<String> = items
        .into_iter()
        .map(|item| params.bind(value_prefix, Binding::new(item)))
        .collect();
    format!("{} {} ({})", column, keyword, placeholders.join(", "))
}

fn pattern(
    column: &str,
    op: Operator,
    value: &SqlValue,
    value_prefix: &'static str,
    params: &mut ParamAllocator,
) -> String {
    let text = value.as_string().unwrap_or_default();
    let (negated, pattern) = match op {
        Operator::Contains => (false, format!("%{}%", text)),
        Operator::EndsWith => (false, format!("%{}", text)),
        Operator::StartsWith => (false, format!("{}%", text)),
        Operator::NotLike => (true, text),
        Operator::NotContains => (true, format!("%{}%", text)),
        Operator::NotEndsWith => (true, format!("%{}", text)),
        Operator::NotStartsWith => (true, format!("{}%", text)),
        _ => (false, text),
    };
    let keyword = if negated { "NOT LIKE" } else { "LIKE" };
    let placeholder = params.bind(value_prefix, Binding::new(pattern));
    format!("{} {} {}", column, keyword, placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::ParamType;
    use serde_json::json;

    fn build(backend: DatabaseBackend, spec: serde_json::Value) -> BuiltQuery {
        QueryBuilder::new(backend).build(&QuerySpec::from_json(spec).unwrap())
    }

    fn mysql(spec: serde_json::Value) -> BuiltQuery {
        build(DatabaseBackend::MySQL, spec)
    }

    #[test]
    fn test_select_star_by_default() {
        let q = mysql(json!({ "from": "items" }));
        assert_eq!(q.sql, "SELECT * FROM `items`");
        assert!(q.bindings.is_empty());
    }

    #[test]
    fn test_select_functions_and_fields() {
        let q = mysql(json!({
            "select": [
                "t.id",
                { "field": ["a", "b"], "function": "CONCAT_WS", "alias": "ab" },
                { "field": "*", "function": "COUNT(" }
            ],
            "from": "t"
        }));
        assert_eq!(
            q.sql,
            "SELECT `t`.`id`, CONCAT_WS(`a`, `b`) AS `ab`, COUNT(*) FROM `t`"
        );
    }

    #[test]
    fn test_insert_and_replace() {
        let q = mysql(json!({ "insert": true, "from": "t", "set": { "id": 1, "val": "x", "note": null } }));
        assert_eq!(
            q.sql,
            "INSERT INTO `t` (`id`, `val`, `note`) VALUES (:setv1, :setv2, NULL)"
        );
        assert_eq!(q.bindings.len(), 2);

        let q = mysql(json!({ "replace": "t", "set": { "id": 1 }, "where": { "id": 1 } }));
        assert_eq!(q.sql, "REPLACE INTO `t` (`id`) VALUES (:setv1)");
    }

    #[test]
    fn test_update_with_where() {
        let q = mysql(json!({
            "update": true, "from": "t",
            "set": { "val": "y" },
            "where": { "id": 3 }
        }));
        assert_eq!(q.sql, "UPDATE `t` SET `val` = :setv1 WHERE `id` = :wherev1");
        assert_eq!(q.bindings["wherev1"].value, SqlValue::BigInt(3));
        assert_eq!(q.bindings["wherev1"].param_type, ParamType::Str);
    }

    #[test]
    fn test_count_and_delete() {
        let q = mysql(json!({ "count": true, "from": "t", "where": { "val": null } }));
        assert_eq!(q.sql, "SELECT COUNT(*) AS `count` FROM `t` WHERE `val` IS NULL");

        let q = mysql(json!({ "delete": true, "from": "t", "where": { "id": 2 } }));
        assert_eq!(q.sql, "DELETE FROM `t` WHERE `id` = :wherev1");
    }

    #[test]
    fn test_where_or_merge() {
        let q = mysql(json!({
            "from": "t",
            "where": { "a": 1 },
            "where_or": { "b": 2, "c": 3 }
        }));
        assert_eq!(
            q.sql,
            "SELECT * FROM `t` WHERE (`a` = :wherev1) AND (`b` = :or1 OR `c` = :or2)"
        );

        let q = mysql(json!({ "from": "t", "where_or": { "b": 2, "c": 3 } }));
        assert_eq!(q.sql, "SELECT * FROM `t` WHERE `b` = :or1 OR `c` = :or2");
    }

    #[test]
    fn test_operators() {
        let q = mysql(json!({
            "from": "t",
            "where": {
                "a": { "type": ">=", "value": 1 },
                "b": { "type": "NOT", "value": "x" },
                "c": { "type": "REGEXP", "value": "^a" },
                "d": { "type": "NOT", "value": null },
                "e": { "type": "NOT %LIKE%", "value": "z" }
            }
        }));
        assert_eq!(
            q.sql,
            "SELECT * FROM `t` WHERE `a` >= :wherev1 AND `b` != :wherev2 AND `c` REGEXP :wherev3 \
             AND `d` IS NOT NULL AND `e` NOT LIKE :wherev4"
        );
        assert_eq!(q.bindings["wherev4"].value, SqlValue::from("%z%"));
    }

    #[test]
    fn test_backtick_value_is_raw_column_reference() {
        let q = mysql(json!({ "from": "t", "where": { "a": "`t`.`b`" } }));
        assert_eq!(q.sql, "SELECT * FROM `t` WHERE `a` = `t`.`b`");
        assert!(q.bindings.is_empty());
    }

    #[test]
    fn test_in_lists() {
        let q = mysql(json!({
            "from": "t",
            "where": {
                "id": { "type": "IN", "value": [1, 2, 3] },
                "kind": { "type": "NOT IN", "value": "x" },
                "none": { "type": "IN", "value": [] }
            }
        }));
        assert_eq!(
            q.sql,
            "SELECT * FROM `t` WHERE `id` IN (:in1, :in2, :in3) AND `kind` NOT IN (:notin1) AND 1 = 0"
        );
    }

    #[test]
    fn test_group_before_order_and_limit() {
        let q = mysql(json!({
            "from": "t",
            "group": "kind",
            "order": "kind DESC, id",
            "limit": "5,10"
        }));
        assert_eq!(
            q.sql,
            "SELECT * FROM `t` GROUP BY `kind` ORDER BY `kind` DESC, `id` LIMIT :limit1, :limit2"
        );
        assert_eq!(q.bindings["limit1"], Binding::int(5));
        assert_eq!(q.bindings["limit2"], Binding::int(10));
    }

    #[test]
    fn test_order_structured_and_random() {
        let spec = json!({
            "from": "t",
            "order": [{ "function": "rand" }, { "field": "name", "function": "LOWER", "sort": "asc" }]
        });
        assert_eq!(
            build(DatabaseBackend::MySQL, spec.clone()).sql,
            "SELECT * FROM `t` ORDER BY RAND(), LOWER(`name`) ASC"
        );
        assert_eq!(
            build(DatabaseBackend::SQLite, spec).sql,
            "SELECT * FROM `t` ORDER BY RANDOM(), LOWER(`name`) ASC"
        );
    }

    #[test]
    fn test_order_raw_is_case_insensitive() {
        let q = mysql(json!({ "from": "t", "order": "a asc,b Desc , c" }));
        assert_eq!(q.sql, "SELECT * FROM `t` ORDER BY `a` ASC, `b` DESC, `c`");
    }

    #[test]
    fn test_empty_order_and_group_produce_nothing() {
        let q = mysql(json!({ "from": "t", "order": "", "group": [], "limit": "" }));
        assert_eq!(q.sql, "SELECT * FROM `t`");
    }

    #[test]
    fn test_positional_conversion() {
        let q = mysql(json!({
            "update": true, "from": "t",
            "set": { "val": "a" },
            "where": { "id": { "type": "IN", "value": [1, 2] } },
            "limit": "1"
        }));
        let (sql, bindings) = q.positional();
        assert_eq!(sql, "UPDATE `t` SET `val` = ? WHERE `id` IN (?, ?) LIMIT ?");
        assert_eq!(bindings.len(), 4);
        assert_eq!(bindings[0].value, SqlValue::from("a"));
        assert_eq!(bindings[3].param_type, ParamType::Int);
    }

    #[test]
    fn test_positional_skips_quoted_regions() {
        let q = BuiltQuery::raw("SELECT ':x', `a:x` FROM t WHERE a = :x")
            .with_binding("x", Binding::new(1));
        let (sql, bindings) = q.positional();
        assert_eq!(sql, "SELECT ':x', `a:x` FROM t WHERE a = ?");
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_interpolated_for_logs() {
        let q = mysql(json!({ "from": "t", "where": { "val": "it's" }, "limit": "3" }));
        assert_eq!(
            q.interpolated(),
            "SELECT * FROM `t` WHERE `val` = 'it''s' LIMIT 3"
        );
    }
}
