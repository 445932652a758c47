use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rowstream_core::aggregation::Aggregation;
use rowstream_core::query::QuerySpec;
use rowstream_core::record::UserRecord;
use rowstream_store::MemoryDriver;
use rowstream_stream::users::{batch_processing, calculate_average_age};
use rowstream_stream::{Aggregator, StreamExt, StreamFactory};
use uuid::Uuid;

const USERS: usize = 10_000;

fn factory() -> StreamFactory {
    let memory = MemoryDriver::new();
    let users: Vec<UserRecord> = (0..USERS)
        .map(|i| {
            UserRecord::new(
                Uuid::from_u128(i as u128 + 1),
                format!("Person{}", i),
                format!("person{}@bench.com", i),
                18 + (i % 60) as i64,
            )
        })
        .collect();
    memory.insert_users("bench", &users).unwrap();
    StreamFactory::new(
        Arc::new(memory),
        "memory://bench",
        QuerySpec::select_all("user_data"),
    )
}

fn bench_row_vs_batch(c: &mut Criterion) {
    let factory = factory();
    let mut group = c.benchmark_group("scan");
    group.bench_function("row_stream", |b| {
        b.iter(|| black_box(factory.rows().filter(|r| r.is_ok()).count()))
    });
    for batch_size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("batch_stream", batch_size), &batch_size, |b, &n| {
            b.iter(|| black_box(factory.batches_of(n).unwrap().into_rows().count()))
        });
    }
    group.finish();
}

fn bench_pipelines(c: &mut Criterion) {
    let factory = factory().with_batch_size(100);
    c.bench_function("average_age", |b| {
        b.iter(|| black_box(calculate_average_age(&factory).unwrap()))
    });
    c.bench_function("batch_processing", |b| {
        b.iter(|| black_box(batch_processing(&factory, 100).unwrap().count()))
    });
    c.bench_function("aggregate_filtered", |b| {
        b.iter(|| {
            let rows = factory.batches().unwrap().where_expr("age >= 40").unwrap();
            black_box(
                Aggregator::new([Aggregation::Count, Aggregation::Max("age".into())])
                    .consume(rows)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_row_vs_batch, bench_pipelines);
criterion_main!(benches);
