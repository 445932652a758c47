//! One row per fetch.

use std::iter::FusedIterator;
use std::sync::Arc;

use rowstream_core::error::Result;
use rowstream_core::query::QuerySpec;
use rowstream_core::types::Row;
use rowstream_store::Driver;

use crate::lifecycle::Source;
use crate::state::StreamState;

/// Lazy sequence of rows, pulled from the store one `fetch_one` at a time.
///
/// Nothing touches the store until `open()` or the first `next()`. After end
/// of data or an error the stream has already released its connection and
/// keeps returning `None`. Dropping the stream at any point releases it too.
pub struct RowStream {
    source: Source,
}

impl RowStream {
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>, query: QuerySpec) -> Self {
        Self {
            source: Source::new(driver, dsn.into(), query),
        }
    }

    /// Acquire the connection and cursor and execute the query now, instead
    /// of on the first pull.
    pub fn open(&mut self) -> Result<()> {
        self.source.open()
    }

    pub fn state(&self) -> StreamState {
        self.source.state()
    }

    /// Release the cursor and connection. Safe in any state.
    pub fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.pull(|m| m.fetch_one())
    }
}

impl FusedIterator for RowStream {}
