//! Open/pull/close bookkeeping shared by `RowStream` and `BatchStream`.

use std::sync::Arc;

use rowstream_core::error::{Error, Result};
use rowstream_core::query::QuerySpec;
use rowstream_store::Driver;

use crate::manager::ConnectionManager;
use crate::state::StreamState;

pub(crate) struct Source {
    driver: Arc<dyn Driver>,
    dsn: String,
    query: QuerySpec,
    manager: Option<ConnectionManager>,
    state: StreamState,
}

impl Source {
    pub(crate) fn new(driver: Arc<dyn Driver>, dsn: String, query: QuerySpec) -> Self {
        Self {
            driver,
            dsn,
            query,
            manager: None,
            state: StreamState::Unopened,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    /// Connect, open the cursor and execute the query.
    ///
    /// Opening an open stream is a no-op; opening a finished one is an error.
    /// On failure the stream is `Failed` and anything acquired is released.
    pub(crate) fn open(&mut self) -> Result<()> {
        match self.state {
            StreamState::Unopened => {}
            StreamState::Open => return Ok(()),
            other => {
                return Err(Error::Invariant(format!(
                    "cannot reopen a {} stream; open a new one",
                    other
                )))
            }
        }
        match self.acquire() {
            Ok(manager) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(session = %manager.session(), sql = %self.query.sql, "stream opened");
                self.manager = Some(manager);
                self.state = StreamState::Open;
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "stream failed to open");
                self.state = StreamState::Failed;
                Err(e)
            }
        }
    }

    fn acquire(&self) -> Result<ConnectionManager> {
        let mut manager = ConnectionManager::open_str(self.driver.as_ref(), &self.dsn)?;
        // On error the manager is dropped here, which closes whatever it holds.
        manager.execute(&self.query.sql, &self.query.params)?;
        Ok(manager)
    }

    /// One step of the stream.
    ///
    /// `fetch` returns `Ok(None)` at end of data. Pulling an unopened stream
    /// opens it first; pulling a finished stream yields nothing.
    pub(crate) fn pull<T, F>(&mut self, fetch: F) -> Option<Result<T>>
    where
        F: FnOnce(&mut ConnectionManager) -> Result<Option<T>>,
    {
        if self.state == StreamState::Unopened {
            if let Err(e) = self.open() {
                return Some(Err(e));
            }
        }
        if self.state != StreamState::Open {
            return None;
        }
        let Some(manager) = self.manager.as_mut() else {
            self.state = StreamState::Failed;
            return Some(Err(Error::Invariant("open stream without a connection".into())));
        };
        match fetch(manager) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => self.release(StreamState::Exhausted).err().map(Err),
            Err(e) => {
                if let Err(_close_err) = self.release(StreamState::Failed) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_close_err, "close after fetch fault failed");
                }
                Some(Err(e))
            }
        }
    }

    /// End an open stream whose cursor is known to be drained, without
    /// another fetch.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.state != StreamState::Open {
            return Ok(());
        }
        self.release(StreamState::Exhausted)
    }

    /// Close from any state. Idempotent.
    pub(crate) fn close(&mut self) -> Result<()> {
        self.release(StreamState::Closed)
    }

    /// Drop the connection and move to `next`; the state changes even when
    /// closing fails.
    fn release(&mut self, next: StreamState) -> Result<()> {
        self.state = next;
        match self.manager.take() {
            Some(mut manager) => manager.close(),
            None => Ok(()),
        }
    }
}
