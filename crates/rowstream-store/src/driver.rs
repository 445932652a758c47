//! The store interface consumed by the streaming layer.
//!
//! Implemented by `MemoryDriver` and `CsvDriver`, and wrapped by
//! `TrackingDriver` / `FaultyDriver`.

use rowstream_core::types::{Row, Scalar};

use crate::dsn::Dsn;
use crate::error::Result;

/// Opens connections to one kind of store.
pub trait Driver: Send + Sync {
    /// Open a live session. Fails when the store is unreachable or the DSN
    /// names something that does not exist.
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>>;
}

/// One live session to a store.
///
/// Invariants:
/// - `close()` is idempotent.
/// - Cursors handed out by a connection refuse to fetch once the connection
///   is closed.
pub trait Connection: Send {
    /// Open a cursor over this session.
    fn cursor(&mut self) -> Result<Box<dyn Cursor>>;

    /// Release the session. Idempotent.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// One statement/result-set position within a connection.
pub trait Cursor: Send {
    /// Execute `sql` with positional `params`, replacing any previous result set.
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()>;

    /// Next row, or `None` once the result set is exhausted.
    fn fetch_one(&mut self) -> Result<Option<Row>>;

    /// Up to `n` rows. Fewer than `n` (possibly zero) means the result set is
    /// exhausted.
    fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(n);
        while rows.len() < n {
            match self.fetch_one()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Release the result set. Idempotent.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

impl<D: Driver + ?Sized> Driver for std::sync::Arc<D> {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        (**self).connect(dsn)
    }
}
