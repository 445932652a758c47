//! Streaming aggregation over live streams


use rowstream_core::aggregation::Aggregation;
use rowstream_core::types::Scalar;
use rowstream_core::Error;
use rowstream_store::FaultPlan;
use rowstream_stream::users::{calculate_average_age, stream_user_ages};
use rowstream_stream::{average, count, sum, Aggregator, StreamExt};
use test_data_gen::{faulty_factory, generate_users, sample_users, tracked_factory};

#[test]
fn test_average_age_of_sample_users() {
    let (factory, counters) = tracked_factory(&sample_users());
    let avg = calculate_average_age(&factory).expect("average");
    assert!((avg - 37.8).abs() < 1e-9, "got {avg}");
    assert_eq!(counters.open_connections(), 0);
}

#[test]
fn test_average_age_of_empty_table_is_zero() {
    let (factory, _) = tracked_factory(&[]);
    assert_eq!(calculate_average_age(&factory).expect("average"), 0.0);
}

#[test]
fn test_stream_user_ages_in_order() {
    let (factory, _) = tracked_factory(&sample_users());
    let ages: Vec<i64> = stream_user_ages(&factory)
        .collect::<Result<_, _>>()
        .expect("ages");
    assert_eq!(ages, vec![35, 42, 28, 45, 39]);
}

#[test]
fn test_aggregator_over_batches_matches_rows() {
    let users = generate_users(1234);
    let expected_sum: i64 = users.iter().map(|u| u.age).sum();
    let (factory, _) = tracked_factory(&users);

    let aggs = [
        Aggregation::Count,
        Aggregation::Sum("age".into()),
        Aggregation::Min("age".into()),
        Aggregation::Max("age".into()),
    ];
    let from_rows = Aggregator::new(aggs.clone())
        .consume(factory.rows())
        .expect("row aggregation");
    let from_batches = Aggregator::new(aggs)
        .consume(factory.batches_of(100).expect("batches"))
        .expect("batch aggregation");

    assert_eq!(from_rows, from_batches);
    let values: Vec<Scalar> = from_rows.into_iter().map(|v| v.value).collect();
    assert_eq!(
        values,
        vec![
            Scalar::I64(1234),
            Scalar::I64(expected_sum),
            Scalar::I64(18),
            Scalar::I64(77),
        ]
    );
}

#[test]
fn test_helpers_compose_with_filters() {
    let (factory, _) = tracked_factory(&sample_users());
    let over_40 = factory.rows().where_expr("age > 40").expect("predicate");
    assert_eq!(count(over_40).expect("count"), 2);
    assert_eq!(
        sum(factory.batches_of(2).expect("batches"), "age").expect("sum"),
        Scalar::I64(189)
    );
    let avg = average(factory.rows().filter_by(|_| true), "age").expect("avg");
    assert!((avg - 37.8).abs() < 1e-9);
}

#[test]
fn test_fault_aborts_without_partial_result() {
    let (factory, counters) = faulty_factory(&generate_users(50), FaultPlan::new().fail_fetch_after(20));
    let err = Aggregator::new([Aggregation::Avg("age".into())])
        .consume(factory.batches_of(10).expect("batches"))
        .expect_err("aggregation must fail");
    assert!(matches!(err, Error::Fetch(_)));
    assert_eq!(counters.open_connections(), 0);

    let err = calculate_average_age(&factory).expect_err("row path fails too");
    assert!(err.is_fetch());
}
