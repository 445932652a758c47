//! Reopenable stream descriptions.

use std::sync::Arc;

use rowstream_core::config::StreamConfig;
use rowstream_core::error::Result;
use rowstream_core::hash::Hash256;
use rowstream_core::query::QuerySpec;
use rowstream_core::types::Row;
use rowstream_store::Driver;

use crate::batch_stream::BatchStream;
use crate::cache::QueryCache;
use crate::fetch::fetch_all;
use crate::row_stream::RowStream;

/// Driver, DSN and query, from which any number of independent streams can
/// be opened. Streams are not restartable in place; a fresh stream from the
/// same factory starts again at the first row.
#[derive(Clone)]
pub struct StreamFactory {
    driver: Arc<dyn Driver>,
    dsn: String,
    query: QuerySpec,
    batch_size: usize,
}

impl StreamFactory {
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>, query: QuerySpec) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
            query,
            batch_size: StreamConfig::default().batch_size,
        }
    }

    /// Factory for `SELECT * FROM <table>` with the configured DSN and batch
    /// size.
    pub fn from_config(driver: Arc<dyn Driver>, cfg: &StreamConfig) -> Result<Self> {
        cfg.validate()?;
        let dsn = cfg.require_dsn()?;
        Ok(Self::new(driver, dsn, cfg.default_query()).with_batch_size(cfg.batch_size))
    }

    pub fn with_query(mut self, query: QuerySpec) -> Self {
        self.query = query;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// A new, unopened row stream.
    pub fn rows(&self) -> RowStream {
        RowStream::new(Arc::clone(&self.driver), self.dsn.clone(), self.query.clone())
    }

    /// A new row stream, opened now so connect and query errors surface here.
    pub fn open_rows(&self) -> Result<RowStream> {
        let mut stream = self.rows();
        stream.open()?;
        Ok(stream)
    }

    /// A new, unopened batch stream with the factory's batch size.
    pub fn batches(&self) -> Result<BatchStream> {
        self.batches_of(self.batch_size)
    }

    pub fn batches_of(&self, batch_size: usize) -> Result<BatchStream> {
        BatchStream::new(
            Arc::clone(&self.driver),
            self.dsn.clone(),
            self.query.clone(),
            batch_size,
        )
    }

    pub fn open_batches(&self, batch_size: usize) -> Result<BatchStream> {
        let mut stream = self.batches_of(batch_size)?;
        stream.open()?;
        Ok(stream)
    }

    /// Every row of the query at once, through `cache` if given.
    pub fn fetch_all(&self, cache: Option<&QueryCache>) -> Result<Arc<Vec<Row>>> {
        fetch_all(self.driver.as_ref(), &self.dsn, &self.query, cache)
    }

    pub fn cache_key(&self) -> Result<Hash256> {
        self.query.cache_key(&self.dsn)
    }
}

impl std::fmt::Debug for StreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFactory")
            .field("dsn", &self.dsn)
            .field("query", &self.query)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
