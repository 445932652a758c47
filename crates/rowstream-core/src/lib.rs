#![forbid(unsafe_code)]
//! rowstream-core: the data model shared by every other rowstream crate.
//!
//! - `types`: `Scalar`, `Row` and `RowBatch`
//! - `schema`: the fixed `user_data` schema and projections of it
//! - `predicate`: `column op literal` comparisons used by drivers and filters
//! - `config`: `StreamConfig` from defaults, env and YAML
//! - `error`: the connection/query/fetch taxonomy
//!
//! No I/O lives here. Drivers are in `rowstream-store`, streams in
//! `rowstream-stream`.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod predicate;
pub mod query;
pub mod record;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
