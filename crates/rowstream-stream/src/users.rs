//! Helpers over the `user_data` table.

use rowstream_core::error::{Error, Result};
use rowstream_core::types::{Row, RowBatch};

use crate::aggregate::average_values;
use crate::batch_stream::BatchStream;
use crate::factory::StreamFactory;
use crate::filter::{Comparison, FilterStage, StreamExt};
use crate::row_stream::RowStream;

/// Users older than this are kept by `batch_processing`.
pub const BATCH_MIN_AGE_EXCLUSIVE: i64 = 25;

/// Every user, one fetch per row.
pub fn stream_users(factory: &StreamFactory) -> RowStream {
    factory.rows()
}

/// Every user, `batch_size` per fetch.
pub fn stream_users_in_batches(factory: &StreamFactory, batch_size: usize) -> Result<BatchStream> {
    factory.batches_of(batch_size)
}

/// Users over 25, read in batches of `batch_size`.
pub fn batch_processing(
    factory: &StreamFactory,
    batch_size: usize,
) -> Result<FilterStage<BatchStream, RowBatch, Comparison>> {
    stream_users_in_batches(factory, batch_size)?
        .where_expr(&format!("age > {}", BATCH_MIN_AGE_EXCLUSIVE))
}

fn age_of(row: Result<Row>) -> Result<i64> {
    let row = row?;
    row.get("age")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::Schema("row has no integer 'age' column".into()))
}

/// Ages only, one at a time.
pub fn stream_user_ages(factory: &StreamFactory) -> impl Iterator<Item = Result<i64>> {
    factory.rows().map(age_of)
}

/// Mean age over every user without holding more than one row; `0.0` when
/// the table is empty.
pub fn calculate_average_age(factory: &StreamFactory) -> Result<f64> {
    average_values(stream_user_ages(factory))
}
