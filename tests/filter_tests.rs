//! FilterStage over row and batch streams


use rowstream_core::types::{Row, Scalar};
use rowstream_core::Error;
use rowstream_stream::users::batch_processing;
use rowstream_stream::{and, Comparison, StreamExt};
use test_data_gen::{ages, generate_users, tracked_factory};

fn age(row: &Row) -> i64 {
    row.get("age").and_then(Scalar::as_i64).unwrap_or_default()
}

#[test]
fn test_batch_processing_keeps_users_over_25() {
    let users = generate_users(250);
    let expected: Vec<i64> = users.iter().map(|u| u.age).filter(|&a| a > 25).collect();
    let (factory, counters) = tracked_factory(&users);

    let rows: Vec<Row> = batch_processing(&factory, 50)
        .expect("pipeline")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(ages(&rows), expected);
    // 250 rows in batches of 50: five full batches plus the empty probe
    assert_eq!(counters.snapshot().fetch_many_calls, 6);
}

#[test]
fn test_row_and_batch_sources_filter_identically() {
    let (factory, _) = tracked_factory(&generate_users(97));
    let by_rows: Vec<Row> = factory
        .rows()
        .filter_by(|r| age(r) % 3 == 0)
        .collect::<Result<_, _>>()
        .expect("rows");
    let by_batches: Vec<Row> = factory
        .batches_of(10)
        .expect("batches")
        .filter_by(|r| age(r) % 3 == 0)
        .collect::<Result<_, _>>()
        .expect("rows");
    assert!(!by_rows.is_empty());
    assert_eq!(by_rows, by_batches);
}

#[test]
fn test_nested_filter_equals_conjunction() {
    let (factory, _) = tracked_factory(&generate_users(120));
    let nested: Vec<Row> = factory
        .rows()
        .where_expr("age >= 40")
        .expect("p1")
        .filter_by(|r| age(r) % 2 == 1)
        .collect::<Result<_, _>>()
        .expect("rows");
    let joined: Vec<Row> = factory
        .batches_of(7)
        .expect("batches")
        .filter_rows(and(
            Comparison::parse("age >= 40").expect("p1"),
            |r: &Row| age(r) % 2 == 1,
        ))
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(nested, joined);
    assert!(ages(&nested).iter().all(|&a| a >= 40 && a % 2 == 1));
}

#[test]
fn test_string_comparison() {
    let (factory, _) = tracked_factory(&generate_users(30));
    let rows: Vec<Row> = factory
        .rows()
        .where_expr("name == 'Person7'")
        .expect("predicate")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(age(&rows[0]), 25);
}

#[test]
fn test_incomparable_literal_is_schema_error() {
    let (factory, counters) = tracked_factory(&generate_users(5));
    let mut filtered = factory
        .rows()
        .where_expr("age > old")
        .expect("parses; typed on first row");
    assert!(matches!(filtered.next(), Some(Err(Error::Schema(_)))));
    assert!(filtered.next().is_none());
    drop(filtered);
    assert_eq!(counters.open_connections(), 0);
}

#[test]
fn test_unparseable_expression_is_rejected_up_front() {
    let (factory, counters) = tracked_factory(&generate_users(5));
    assert!(factory.rows().where_expr("age").is_err());
    assert_eq!(counters.snapshot().connects, 0);
}
