//! Scoped ownership of one store connection and its cursor.
//!
//! A `ConnectionManager` is the only thing in the streaming layer that talks
//! to a `Connection` directly. It hands out its cursor by `&mut`, so there is
//! never more than one outstanding fetch, and it closes the cursor before the
//! connection, each exactly once, either on `close()` or when dropped.

use rowstream_core::error::{Error, Result};
use rowstream_core::id::SessionId;
use rowstream_core::types::{Row, Scalar};
use rowstream_store::{Connection, Cursor, Driver, Dsn, StoreError};

/// Where a store error happened; decides which `Error` variant it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Connect,
    Cursor,
    Execute,
    Fetch,
    Close,
}

pub(crate) fn store_error(phase: Phase, err: StoreError) -> Error {
    match phase {
        Phase::Connect | Phase::Close => Error::Connection(err.to_string()),
        Phase::Cursor | Phase::Execute => Error::Query(err.to_string()),
        Phase::Fetch => Error::Fetch(err.to_string()),
    }
}

pub struct ConnectionManager {
    session: SessionId,
    conn: Option<Box<dyn Connection>>,
    cursor: Option<Box<dyn Cursor>>,
}

impl ConnectionManager {
    /// Connect through `driver`. No cursor is opened until one is asked for.
    pub fn open(driver: &dyn Driver, dsn: &Dsn) -> Result<Self> {
        let session = SessionId::next();
        let conn = driver
            .connect(dsn)
            .map_err(|e| store_error(Phase::Connect, e))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(%session, dsn = %dsn, "connection opened");
        Ok(Self {
            session,
            conn: Some(conn),
            cursor: None,
        })
    }

    /// `open` with a DSN string; a malformed DSN is a connection error.
    pub fn open_str(driver: &dyn Driver, dsn: &str) -> Result<Self> {
        let dsn = Dsn::parse(dsn).map_err(|e| store_error(Phase::Connect, e))?;
        Self::open(driver, &dsn)
    }

    /// Run `f` against a freshly opened manager and release everything
    /// afterwards, whether `f` succeeded or not.
    ///
    /// An error from `f` wins over an error from closing.
    pub fn scoped<T, F>(driver: &dyn Driver, dsn: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConnectionManager) -> Result<T>,
    {
        let mut manager = Self::open_str(driver, dsn)?;
        let out = f(&mut manager);
        let closed = manager.close();
        let value = out?;
        closed?;
        Ok(value)
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// The cursor of this connection, opened on first use.
    pub fn cursor(&mut self) -> Result<&mut (dyn Cursor + 'static)> {
        if self.cursor.is_none() {
            let conn = self
                .conn
                .as_mut()
                .ok_or_else(|| Error::Query("connection is closed".into()))?;
            let cursor = conn.cursor().map_err(|e| store_error(Phase::Cursor, e))?;
            self.cursor = Some(cursor);
        }
        self.cursor
            .as_deref_mut()
            .ok_or_else(|| Error::Invariant("cursor vanished after open".into()))
    }

    pub fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(session = %self.session, sql, params = params.len(), "executing query");
        self.cursor()?
            .execute(sql, params)
            .map_err(|e| store_error(Phase::Execute, e))
    }

    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        let cursor = self.live_cursor()?;
        let row = cursor.fetch_one().map_err(|e| store_error(Phase::Fetch, e))?;
        #[cfg(feature = "tracing")]
        tracing::trace!(session = %self.session, hit = row.is_some(), "fetch_one");
        Ok(row)
    }

    pub fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let cursor = self.live_cursor()?;
        let rows = cursor.fetch_many(n).map_err(|e| store_error(Phase::Fetch, e))?;
        #[cfg(feature = "tracing")]
        tracing::trace!(session = %self.session, requested = n, got = rows.len(), "fetch_many");
        Ok(rows)
    }

    /// Cursor for fetching; fetching through a closed manager is a fetch
    /// error, never a silent end of data.
    fn live_cursor(&mut self) -> Result<&mut (dyn Cursor + 'static)> {
        if self.conn.is_none() {
            return Err(Error::Fetch("connection is closed".into()));
        }
        self.cursor
            .as_deref_mut()
            .ok_or_else(|| Error::Fetch("no query has been executed".into()))
    }

    /// Close the cursor, then the connection. Idempotent.
    ///
    /// Both are closed even if the first close fails; the first error is
    /// returned.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                first_err = Some(store_error(Phase::Close, e));
            }
        }
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                first_err.get_or_insert(store_error(Phase::Close, e));
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(session = %self.session, "connection closed");
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.conn.is_none() && self.cursor.is_none() {
            return;
        }
        if let Err(_e) = self.close() {
            #[cfg(feature = "tracing")]
            tracing::warn!(session = %self.session, error = %_e, "close on drop failed");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("session", &self.session)
            .field("closed", &self.is_closed())
            .field("has_cursor", &self.cursor.is_some())
            .finish()
    }
}
