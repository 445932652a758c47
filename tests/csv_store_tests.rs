//! Streaming from a CSV-backed store through the scheme registry


use std::sync::Arc;

use rowstream_core::config::StreamConfig;
use rowstream_core::query::QuerySpec;
use rowstream_core::types::{Row, Scalar};
use rowstream_store::{DriverRegistry, MemoryDriver, TrackingDriver};
use rowstream_stream::users::calculate_average_age;
use rowstream_stream::{StreamExt, StreamFactory};
use test_data_gen::{ages, csv_dsn, generate_users, sample_users, write_users_csv};

fn csv_factory(dir: &std::path::Path) -> StreamFactory {
    let cfg = StreamConfig {
        dsn: Some(csv_dsn(dir)),
        batch_size: 64,
        ..Default::default()
    };
    let registry = DriverRegistry::with_defaults(MemoryDriver::new());
    StreamFactory::from_config(Arc::new(registry), &cfg).expect("factory")
}

#[test]
fn test_csv_rows_and_average() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_users_csv(dir.path(), &sample_users());
    let factory = csv_factory(dir.path());

    let rows: Vec<Row> = factory.rows().collect::<Result<_, _>>().expect("rows");
    assert_eq!(ages(&rows), vec![35, 42, 28, 45, 39]);
    let avg = calculate_average_age(&factory).expect("average");
    assert!((avg - 37.8).abs() < 1e-9);
}

#[test]
fn test_csv_batches_cover_large_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let users = generate_users(5000);
    write_users_csv(dir.path(), &users);
    let factory = csv_factory(dir.path());

    let mut batches = 0;
    let mut rows = 0;
    for batch in factory.batches().expect("batch stream") {
        let batch = batch.expect("batch");
        assert!(batch.num_rows() <= 64);
        batches += 1;
        rows += batch.num_rows();
    }
    assert_eq!(rows, 5000);
    assert_eq!(batches, 5000usize.div_ceil(64));
}

#[test]
fn test_csv_where_pushdown_with_params() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_users_csv(dir.path(), &generate_users(200));
    let factory = csv_factory(dir.path()).with_query(
        QuerySpec::new("select name, age from user_data where age = ? limit 2")
            .with_params(vec![Scalar::I64(30)]),
    );
    let rows: Vec<Row> = factory.rows().collect::<Result<_, _>>().expect("rows");
    let names: Vec<_> = rows
        .iter()
        .map(|r| r.get("name").and_then(Scalar::as_str).unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["Person12", "Person72"]);
}

#[test]
fn test_csv_decode_fault_is_fetch_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("user_data.csv"),
        "user_id,name,email,age\nid-1,Ann,ann@example.com,35\nid-2,Bo,bo@example.com,forty\n",
    )
    .expect("write csv");
    let factory = csv_factory(dir.path());
    let items: Vec<_> = factory.rows().collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].as_ref().err().is_some_and(|e| e.is_fetch()));
}

#[test]
fn test_registry_rejects_unknown_scheme_and_missing_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry: Arc<DriverRegistry> = Arc::new(DriverRegistry::with_defaults(MemoryDriver::new()));

    let pg = StreamFactory::new(registry.clone(), "postgres://localhost/prodev", QuerySpec::select_all("user_data"));
    assert!(pg.open_rows().err().is_some_and(|e| e.is_connection()));

    let missing = dir.path().join("absent");
    let factory = StreamFactory::new(registry, csv_dsn(&missing), QuerySpec::select_all("user_data"));
    assert!(factory.open_rows().err().is_some_and(|e| e.is_connection()));
}

#[test]
fn test_missing_table_file_is_query_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = TrackingDriver::new(DriverRegistry::with_defaults(MemoryDriver::new()));
    let counters = driver.counters();
    let factory = StreamFactory::new(Arc::new(driver), csv_dsn(dir.path()), QuerySpec::select_all("user_data"));
    let err = factory.rows().where_expr("age > 1").expect("predicate").next();
    assert!(matches!(err, Some(Err(e)) if e.is_query()));
    assert_eq!(counters.open_connections(), 0);
}
