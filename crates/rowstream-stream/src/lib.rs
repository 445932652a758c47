#![forbid(unsafe_code)]
//! rowstream-stream: bounded-memory streaming over a store cursor.
//!
//! Everything here is pull-based. A `RowStream` or `BatchStream` owns a
//! `ConnectionManager` for as long as it is open; filters and aggregators
//! compose on top of either and never hold more than the current upstream
//! element.
//!
//! Module map:
//! - `manager`: scoped connection + cursor ownership, released exactly once
//! - `row_stream` / `batch_stream`: the two lazy sources
//! - `filter`: predicate stages over rows or batches
//! - `aggregate`: O(1)-memory reductions
//! - `factory`: reopenable stream descriptions
//! - `cache` / `fetch`: materialized small results
//! - `users`: `user_data` helpers

pub mod aggregate;
pub mod batch_stream;
pub mod cache;
pub mod factory;
pub mod fetch;
pub mod filter;
pub mod manager;
pub mod row_stream;
pub mod state;
pub mod users;

mod lifecycle;

pub use aggregate::{average, average_values, count, sum, AggregateValue, Aggregator, Numeric};
pub use batch_stream::BatchStream;
pub use cache::{CacheStats, QueryCache};
pub use factory::StreamFactory;
pub use fetch::{execute_query, fetch_all};
pub use filter::{and, AcceptAll, And, Comparison, FilterStage, IntoRows, RowPredicate, StreamExt};
pub use manager::ConnectionManager;
pub use row_stream::RowStream;
pub use state::StreamState;
