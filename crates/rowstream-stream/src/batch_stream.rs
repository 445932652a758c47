//! Fixed-size batches, one `fetch_many` per batch.

use std::iter::FusedIterator;
use std::sync::Arc;

use rowstream_core::error::{Error, Result};
use rowstream_core::query::QuerySpec;
use rowstream_core::types::RowBatch;
use rowstream_store::Driver;

use crate::filter::{AcceptAll, FilterStage};
use crate::lifecycle::Source;
use crate::state::StreamState;

/// Rows of a `BatchStream`, in order.
pub type BatchRows = FilterStage<BatchStream, RowBatch, AcceptAll>;

/// Lazy sequence of `RowBatch`es of at most `batch_size` rows.
///
/// A fetch that comes back short marks the cursor drained: the connection is
/// released before the short batch is yielded, so the stream is already
/// `Exhausted` when the consumer sees its last batch. Only when the row count
/// is a multiple of `batch_size` does the stream need one extra, empty fetch
/// to see the end. Empty batches are never yielded.
///
/// If releasing fails, the batch is still yielded and the close error is the
/// next item.
pub struct BatchStream {
    source: Source,
    batch_size: usize,
    drained: bool,
    deferred: Option<Error>,
}

impl BatchStream {
    /// Fails with a config error when `batch_size` is 0; nothing is opened.
    pub fn new(
        driver: Arc<dyn Driver>,
        dsn: impl Into<String>,
        query: QuerySpec,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(Self {
            source: Source::new(driver, dsn.into(), query),
            batch_size,
            drained: false,
            deferred: None,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn open(&mut self) -> Result<()> {
        self.source.open()
    }

    pub fn state(&self) -> StreamState {
        self.source.state()
    }

    /// Close from any state. A close error still pending from the eager
    /// release after the last batch is returned here.
    pub fn close(&mut self) -> Result<()> {
        let pending = self.deferred.take();
        self.source.close()?;
        pending.map_or(Ok(()), Err)
    }

    /// Flatten into individual rows, still fetching `batch_size` at a time.
    pub fn into_rows(self) -> BatchRows {
        FilterStage::new(self, AcceptAll)
    }
}

impl Iterator for BatchStream {
    type Item = Result<RowBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        let batch_size = self.batch_size;
        let drained = &mut self.drained;
        let item = self.source.pull(|m| {
            if *drained {
                return Ok(None);
            }
            let rows = m.fetch_many(batch_size)?;
            if rows.len() < batch_size {
                *drained = true;
            }
            if rows.is_empty() {
                Ok(None)
            } else {
                Ok(Some(RowBatch::new(rows)))
            }
        });
        if self.drained {
            if let Err(e) = self.source.finish() {
                match item {
                    Some(Ok(_)) => self.deferred = Some(e),
                    None => return Some(Err(e)),
                    Some(Err(_)) => {}
                }
            }
        }
        item
    }
}

impl FusedIterator for BatchStream {}
