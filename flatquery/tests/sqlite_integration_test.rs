use flatquery::events::names;
use flatquery::prelude::*;
use indexmap::IndexMap;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn item_fields() -> IndexMap<String, String> {
    IndexMap::from([
        ("id".to_string(), "int(10)".to_string()),
        ("val".to_string(), "text".to_string()),
    ])
}

async fn file_database(dir: &tempfile::TempDir) -> Executor {
    init_logging();
    let url = format!("sqlite://{}", dir.path().join("flatquery.db").display());
    Executor::connect(&ConnectionConfig::new(url)).await.unwrap()
}

async fn seed(db: &mut Executor) {
    db.schema().create_table("items", &item_fields()).await.unwrap();
    let values = [
        (1, "erster Eintrag"),
        (2, "text für id 2"),
        (3, "text für id 3"),
        (4, "text für id 4"),
    ];
    for (id, val) in values {
        let spec = QuerySpec::from_json(json!({
            "insert": ["items"],
            "set": {"id": id, "val": val}
        }))
        .unwrap();
        assert_eq!(db.execute(&spec).await.unwrap().rows_affected(), 1);
    }
}

#[tokio::test]
async fn test_insert_delete_and_pattern_search() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    seed(&mut db).await;

    let delete = QuerySpec::from_json(json!({"delete": ["items"], "where": {"id": 2}})).unwrap();
    assert_eq!(db.execute(&delete).await.unwrap().rows_affected(), 1);

    let search = QuerySpec::from_json(json!({
        "from": ["items"],
        "where": {"val": {"type": "%LIKE%", "value": "id "}},
        "order": "id ASC"
    }))
    .unwrap();
    let rows = db.fetch_rows(&search, FetchStyle::Assoc).await.unwrap();
    let ids: Vec<serde_json::Value> = rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(3), json!(4)]);
    assert_eq!(rows[0]["val"], json!("text für id 3"));
}

#[tokio::test]
async fn test_columns_roundtrip_and_key_noops() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    let mut schema = db.schema();
    schema.create_table("items", &item_fields()).await.unwrap();

    assert_eq!(schema.get_columns("items").await.unwrap(), vec!["id", "val"]);

    schema.set_primary_key("items", &["id"]).await.unwrap();
    schema.set_unique("items", &["val"]).await.unwrap();
    assert!(!schema.has_primary_key("items").await.unwrap());
    assert!(!schema.has_unique("items", &["val"]).await.unwrap());
    assert!(!schema.has_auto_increment("items").await.unwrap());

    let err = schema.set_fulltext("items", &["val"]).await.unwrap_err();
    match err {
        Error::Schema {
            backend, operation, ..
        } => {
            assert_eq!(backend, DatabaseBackend::SQLite);
            assert_eq!(operation, "set_fulltext");
        }
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_append_fields_one_column_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    let mut schema = db.schema();
    schema.create_table("items", &item_fields()).await.unwrap();

    let extra = IndexMap::from([
        ("created".to_string(), "datetime".to_string()),
        ("score".to_string(), "".to_string()),
    ]);
    schema.append_fields("items", &extra).await.unwrap();
    assert_eq!(
        schema.get_columns("items").await.unwrap(),
        vec!["id", "val", "created", "score"]
    );

    let described = schema.describe_columns("items").await.unwrap();
    assert_eq!(described[3]["type"], json!("TEXT"));
}

#[tokio::test]
async fn test_truncate_recreates_table_with_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    seed(&mut db).await;
    db.schema().set_index("items", &["val"]).await.unwrap();

    db.schema().truncate_table("items").await.unwrap();

    let count = db
        .count(&QuerySpec::from_json(json!({"from": ["items"]})).unwrap())
        .await
        .unwrap();
    assert_eq!(count, 0);

    let mut schema = db.schema();
    assert!(schema.table_exists("items").await.unwrap());
    assert_eq!(schema.get_columns("items").await.unwrap(), vec!["id", "val"]);
    assert!(schema.has_index("items", &["val"]).await.unwrap());
}

#[tokio::test]
async fn test_drop_then_recreate() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    let mut schema = db.schema();
    schema.create_table("items", &item_fields()).await.unwrap();
    schema.drop_table("items").await.unwrap();
    assert!(schema.list_tables().await.unwrap().is_empty());

    // Dropping twice is a driver failure, wrapped with the statement
    let err = schema.drop_table("items").await.unwrap_err();
    assert_eq!(err.error_code(), "E_DB_QUERY");

    schema.create_table("items", &item_fields()).await.unwrap();
    assert!(schema.table_exists("items").await.unwrap());
}

#[tokio::test]
async fn test_fetch_styles_and_typed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    seed(&mut db).await;

    let spec = QuerySpec::from_json(json!({
        "select": ["id", "val"],
        "from": ["items"],
        "where": {"id": 3}
    }))
    .unwrap();

    let unknown = db
        .fetch_rows(&spec, FetchStyle::parse("no-such-style"))
        .await
        .unwrap();
    let assoc = db.fetch_rows(&spec, FetchStyle::Assoc).await.unwrap();
    assert_eq!(unknown, assoc);

    let both = db.fetch_rows(&spec, FetchStyle::Both).await.unwrap();
    assert_eq!(both[0]["0"], json!(3));
    assert_eq!(both[0]["val"], both[0]["1"]);

    #[derive(serde::Deserialize)]
    struct Item {
        id: i64,
        val: String,
    }
    let items: Vec<Item> = db.execute(&spec).await.unwrap().fetch_as().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, 3);
    assert_eq!(items[0].val, "text für id 3");

    let first = db
        .fetch_one(&QuerySpec::from_json(json!({"from": ["items"], "order": "id DESC"})).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["id"], json!(4));
}

#[tokio::test]
async fn test_update_and_null_set_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = file_database(&dir).await;
    seed(&mut db).await;

    let update = QuerySpec::from_json(json!({
        "update": ["items"],
        "set": {"val": null},
        "where": {"id": {"type": ">=", "value": 3}}
    }))
    .unwrap();
    assert_eq!(db.execute(&update).await.unwrap().rows_affected(), 2);

    let nulls = QuerySpec::from_json(json!({"count": ["items"], "where": {"val": null}})).unwrap();
    assert_eq!(db.count(&nulls).await.unwrap(), 2);
}

#[tokio::test]
async fn test_events_follow_statement_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut emitter = EventEmitter::new();
    for name in [
        names::PRE_BUILD,
        names::PRE_EXECUTE,
        names::POST_EXECUTE,
        names::POST_ERROR,
    ] {
        let seen = seen.clone();
        emitter.on(name, move |event| seen.lock().unwrap().push(event.event));
    }

    let mut db = file_database(&dir).await.with_sink(Arc::new(emitter));
    db.execute_raw("CREATE TABLE t (id INTEGER)").await.unwrap();
    seen.lock().unwrap().clear();

    let spec = QuerySpec::from_json(json!({"from": ["t"], "debug": true})).unwrap();
    db.execute(&spec).await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![names::PRE_BUILD, names::PRE_EXECUTE, names::POST_EXECUTE]
    );

    seen.lock().unwrap().clear();
    let broken = QuerySpec::from_json(json!({"from": ["nope"]})).unwrap();
    let err = db.execute(&broken).await.unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![names::PRE_BUILD, names::PRE_EXECUTE, names::POST_ERROR]
    );
}

#[test]
fn test_unknown_url_scheme_is_config_error() {
    let config = ConnectionConfig::new("oracle://db.local/app");
    let err = tokio_test::block_on(Executor::connect(&config)).err().unwrap();
    assert_eq!(err.error_code(), "E_CONFIG");
}
