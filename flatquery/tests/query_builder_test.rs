use flatquery::query_builder::{Binding, ParamType, QueryBuilder, QuerySpec};
use flatquery::{DatabaseBackend, SqlValue};
use serde_json::json;
use std::collections::HashSet;

fn build(backend: DatabaseBackend, spec: serde_json::Value) -> flatquery::BuiltQuery {
    let spec = QuerySpec::from_json(spec).unwrap();
    QueryBuilder::new(backend).build(&spec)
}

fn both(spec: serde_json::Value) -> Vec<flatquery::BuiltQuery> {
    [DatabaseBackend::MySQL, DatabaseBackend::SQLite]
        .into_iter()
        .map(|backend| build(backend, spec.clone()))
        .collect()
}

#[test]
fn test_scalar_where_entries_get_unique_placeholders() {
    for q in both(json!({
        "from": ["items"],
        "where": {"a": 1, "b": "two", "c": 3.5, "d": true, "e": null}
    })) {
        // Null renders IS NULL and takes no binding
        assert_eq!(q.bindings.len(), 4);
        let names = q.placeholder_names();
        assert_eq!(names.len(), 4);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(q.sql.contains("`e` IS NULL"));
    }
}

#[test]
fn test_in_and_not_in_bind_every_element_in_order() {
    let q = build(
        DatabaseBackend::SQLite,
        json!({
            "from": ["items"],
            "where": {
                "id": {"type": "IN", "value": [4, 5, 6]},
                "val": {"type": "NOT IN", "value": ["x", "y"]}
            }
        }),
    );
    assert_eq!(
        q.sql,
        "SELECT * FROM `items` WHERE `id` IN (:in1, :in2, :in3) AND `val` NOT IN (:notin1, :notin2)"
    );

    let (sql, ordered) = q.positional();
    assert_eq!(
        sql,
        "SELECT * FROM `items` WHERE `id` IN (?, ?, ?) AND `val` NOT IN (?, ?)"
    );
    let values: Vec<Option<String>> = ordered.iter().map(|b| b.value.as_string()).collect();
    assert_eq!(
        values,
        vec![
            Some("4".to_string()),
            Some("5".to_string()),
            Some("6".to_string()),
            Some("x".to_string()),
            Some("y".to_string())
        ]
    );
}

#[test]
fn test_limit_bindings_are_integers_and_clamped() {
    let q = build(DatabaseBackend::MySQL, json!({"from": ["t"], "limit": "5"}));
    assert_eq!(q.sql, "SELECT * FROM `t` LIMIT :limit1");
    assert_eq!(q.bindings["limit1"], Binding::int(5));

    let q = build(DatabaseBackend::MySQL, json!({"from": ["t"], "limit": "5,10"}));
    assert_eq!(q.sql, "SELECT * FROM `t` LIMIT :limit1, :limit2");
    assert_eq!(q.bindings["limit1"], Binding::int(5));
    assert_eq!(q.bindings["limit2"], Binding::int(10));

    let q = build(DatabaseBackend::SQLite, json!({"from": ["t"], "limit": "-3,10"}));
    assert_eq!(q.bindings["limit1"], Binding::int(0));
    assert_eq!(q.bindings["limit2"], Binding::int(10));
    assert!(q
        .bindings
        .values()
        .all(|b| b.param_type == ParamType::Int));

    let q = build(DatabaseBackend::SQLite, json!({"from": ["t"], "limit": ""}));
    assert_eq!(q.sql, "SELECT * FROM `t`");
}

#[test]
fn test_like_variants_share_keyword_and_differ_in_value() {
    let cases = [
        ("%LIKE%", "%id %"),
        ("%LIKE", "%id "),
        ("LIKE%", "id %"),
    ];
    let mut seen = HashSet::new();
    for (op, expected) in cases {
        let q = build(
            DatabaseBackend::SQLite,
            json!({"from": ["t"], "where": {"val": {"type": op, "value": "id "}}}),
        );
        assert_eq!(q.sql, "SELECT * FROM `t` WHERE `val` LIKE :wherev1");
        assert_eq!(q.bindings["wherev1"].value, SqlValue::from(expected));
        seen.insert(expected);
    }
    assert_eq!(seen.len(), 3);

    let q = build(
        DatabaseBackend::MySQL,
        json!({"from": ["t"], "where": {"val": {"type": "NOT %LIKE%", "value": "x"}}}),
    );
    assert_eq!(q.sql, "SELECT * FROM `t` WHERE `val` NOT LIKE :wherev1");
}

#[test]
fn test_action_precedence() {
    let q = build(
        DatabaseBackend::MySQL,
        json!({
            "insert": true,
            "update": true,
            "delete": true,
            "from": ["t"],
            "set": {"a": 1},
            "where": {"id": 1}
        }),
    );
    assert_eq!(q.sql, "INSERT INTO `t` (`a`) VALUES (:setv1)");

    let q = build(
        DatabaseBackend::MySQL,
        json!({"count": ["t"], "delete": ["t"], "where": {"id": 1}}),
    );
    assert_eq!(q.sql, "SELECT COUNT(*) AS `count` FROM `t` WHERE `id` = :wherev1");
}

#[test]
fn test_random_order_follows_dialect() {
    let spec = json!({"from": ["t"], "order": [{"function": "RAND"}]});
    assert_eq!(
        build(DatabaseBackend::MySQL, spec.clone()).sql,
        "SELECT * FROM `t` ORDER BY RAND()"
    );
    assert_eq!(
        build(DatabaseBackend::SQLite, spec).sql,
        "SELECT * FROM `t` ORDER BY RANDOM()"
    );
}

#[test]
fn test_hostile_identifiers_are_cleaned() {
    let q = build(
        DatabaseBackend::MySQL,
        json!({
            "select": ["name; DROP TABLE users", "u.*"],
            "from": ["users`--"],
            "where": {"id) OR (1": 1}
        }),
    );
    assert_eq!(
        q.sql,
        "SELECT `nameDROPTABLEusers`, `u`.* FROM `users` WHERE `idOR1` = :wherev1"
    );
}
