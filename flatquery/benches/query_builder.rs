use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flatquery::query_builder::{QueryBuilder, QuerySpec};
use flatquery::DatabaseBackend;
use serde_json::json;

fn search_spec() -> QuerySpec {
    QuerySpec::from_json(json!({
        "select": ["id", "val", {"field": "val", "function": "LENGTH", "alias": "len"}],
        "from": ["items"],
        "where": {
            "id": {"type": "IN", "value": [1, 2, 3, 4, 5, 6, 7, 8]},
            "val": {"type": "%LIKE%", "value": "id "},
            "deleted": null
        },
        "where_or": {"owner": 7, "public": 1},
        "order": "id DESC, val",
        "limit": "20,10"
    }))
    .unwrap()
}

fn benchmark_build_select(c: &mut Criterion) {
    let spec = search_spec();
    let builder = QueryBuilder::new(DatabaseBackend::MySQL);

    c.bench_function("QueryBuilder::build select", |b| {
        b.iter(|| {
            let query = builder.build(black_box(&spec));
            black_box(query);
        })
    });
}

fn benchmark_positional(c: &mut Criterion) {
    let query = QueryBuilder::new(DatabaseBackend::SQLite).build(&search_spec());

    c.bench_function("BuiltQuery::positional", |b| {
        b.iter(|| {
            let converted = black_box(&query).positional();
            black_box(converted);
        })
    });
}

fn benchmark_spec_from_json(c: &mut Criterion) {
    let raw = r#"{"update": ["items"], "set": {"val": "x", "n": 2}, "where": {"id": 9}}"#;

    c.bench_function("QuerySpec::from_json_str", |b| {
        b.iter(|| {
            let spec = QuerySpec::from_json_str(black_box(raw)).unwrap();
            black_box(spec);
        })
    });
}

criterion_group!(
    benches,
    benchmark_build_select,
    benchmark_positional,
    benchmark_spec_from_json
);
criterion_main!(benches);
