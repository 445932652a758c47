//! Lifecycle accounting around any driver.
//!
//! `TrackingDriver` counts connects, cursor opens, closes and fetch round
//! trips, and keeps a gauge of open connections with its high-water mark.
//! Counters are plain atomics shared through an `Arc`; reading them never
//! blocks the streams being counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rowstream_core::types::{Row, Scalar};

use crate::driver::{Connection, Cursor, Driver};
use crate::dsn::Dsn;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct LifecycleCounters {
    connects: AtomicUsize,
    connect_failures: AtomicUsize,
    connection_close_calls: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursor_close_calls: AtomicUsize,
    executes: AtomicUsize,
    fetch_one_calls: AtomicUsize,
    fetch_many_calls: AtomicUsize,
    rows_fetched: AtomicUsize,
    open_connections: AtomicUsize,
    peak_open_connections: AtomicUsize,
}

/// Point-in-time copy of `LifecycleCounters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub connects: usize,
    pub connect_failures: usize,
    pub connection_close_calls: usize,
    pub cursors_opened: usize,
    pub cursor_close_calls: usize,
    pub executes: usize,
    pub fetch_one_calls: usize,
    pub fetch_many_calls: usize,
    pub rows_fetched: usize,
    pub open_connections: usize,
    pub peak_open_connections: usize,
}

impl LifecycleSnapshot {
    /// Total fetch round trips, single- and multi-row.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_one_calls + self.fetch_many_calls
    }
}

impl LifecycleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        let get = |a: &AtomicUsize| a.load(Ordering::Acquire);
        LifecycleSnapshot {
            connects: get(&self.connects),
            connect_failures: get(&self.connect_failures),
            connection_close_calls: get(&self.connection_close_calls),
            cursors_opened: get(&self.cursors_opened),
            cursor_close_calls: get(&self.cursor_close_calls),
            executes: get(&self.executes),
            fetch_one_calls: get(&self.fetch_one_calls),
            fetch_many_calls: get(&self.fetch_many_calls),
            rows_fetched: get(&self.rows_fetched),
            open_connections: get(&self.open_connections),
            peak_open_connections: get(&self.peak_open_connections),
        }
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Acquire)
    }

    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::AcqRel);
    }

    fn connection_opened(&self) {
        let now = self.open_connections.fetch_add(1, Ordering::AcqRel) + 1;
        let mut cur = self.peak_open_connections.load(Ordering::Relaxed);
        while now > cur {
            match self.peak_open_connections.compare_exchange(
                cur,
                now,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    fn connection_released(&self) {
        self.open_connections.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Wraps a driver and records every lifecycle event in shared counters.
pub struct TrackingDriver<D> {
    inner: D,
    counters: Arc<LifecycleCounters>,
}

impl<D: Driver> TrackingDriver<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            counters: Arc::new(LifecycleCounters::new()),
        }
    }

    pub fn counters(&self) -> Arc<LifecycleCounters> {
        Arc::clone(&self.counters)
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Driver> Driver for TrackingDriver<D> {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        match self.inner.connect(dsn) {
            Ok(inner) => {
                LifecycleCounters::bump(&self.counters.connects, 1);
                self.counters.connection_opened();
                Ok(Box::new(TrackedConnection {
                    inner,
                    counters: Arc::clone(&self.counters),
                    released: false,
                }))
            }
            Err(e) => {
                LifecycleCounters::bump(&self.counters.connect_failures, 1);
                Err(e)
            }
        }
    }
}

struct TrackedConnection {
    inner: Box<dyn Connection>,
    counters: Arc<LifecycleCounters>,
    released: bool,
}

impl Connection for TrackedConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        let inner = self.inner.cursor()?;
        LifecycleCounters::bump(&self.counters.cursors_opened, 1);
        Ok(Box::new(TrackedCursor {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn close(&mut self) -> Result<()> {
        LifecycleCounters::bump(&self.counters.connection_close_calls, 1);
        if !self.released {
            self.released = true;
            self.counters.connection_released();
        }
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

struct TrackedCursor {
    inner: Box<dyn Cursor>,
    counters: Arc<LifecycleCounters>,
}

impl Cursor for TrackedCursor {
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()> {
        LifecycleCounters::bump(&self.counters.executes, 1);
        self.inner.execute(sql, params)
    }

    fn fetch_one(&mut self) -> Result<Option<Row>> {
        LifecycleCounters::bump(&self.counters.fetch_one_calls, 1);
        let row = self.inner.fetch_one()?;
        if row.is_some() {
            LifecycleCounters::bump(&self.counters.rows_fetched, 1);
        }
        Ok(row)
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        LifecycleCounters::bump(&self.counters.fetch_many_calls, 1);
        let rows = self.inner.fetch_many(n)?;
        LifecycleCounters::bump(&self.counters.rows_fetched, rows.len());
        Ok(rows)
    }

    fn close(&mut self) -> Result<()> {
        LifecycleCounters::bump(&self.counters.cursor_close_calls, 1);
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;
    use rowstream_core::record::UserRecord;
    use uuid::Uuid;

    fn driver_with_users(n: u128) -> TrackingDriver<MemoryDriver> {
        let memory = MemoryDriver::new();
        let users: Vec<UserRecord> = (0..n)
            .map(|i| UserRecord::new(Uuid::from_u128(i + 1), format!("u{i}"), "u@example.com", 30))
            .collect();
        memory.insert_users("db", &users).unwrap();
        TrackingDriver::new(memory)
    }

    #[test]
    fn test_counts_round_trips_and_rows() {
        let driver = driver_with_users(5);
        let counters = driver.counters();
        let dsn = Dsn::parse("memory://db").unwrap();

        let mut conn = driver.connect(&dsn).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor.execute("SELECT * FROM user_data", &[]).unwrap();
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 2);
        assert!(cursor.fetch_one().unwrap().is_some());
        cursor.close().unwrap();
        conn.close().unwrap();

        let snap = counters.snapshot();
        assert_eq!(snap.connects, 1);
        assert_eq!(snap.cursors_opened, 1);
        assert_eq!(snap.executes, 1);
        assert_eq!(snap.fetch_many_calls, 1);
        assert_eq!(snap.fetch_one_calls, 1);
        assert_eq!(snap.rows_fetched, 3);
        assert_eq!(snap.open_connections, 0);
        assert_eq!(snap.peak_open_connections, 1);
    }

    #[test]
    fn test_repeated_close_counts_calls_but_releases_once() {
        let driver = driver_with_users(1);
        let counters = driver.counters();
        let mut conn = driver.connect(&Dsn::parse("memory://db").unwrap()).unwrap();
        conn.close().unwrap();
        conn.close().unwrap();

        let snap = counters.snapshot();
        assert_eq!(snap.connection_close_calls, 2);
        assert_eq!(snap.open_connections, 0);
    }

    #[test]
    fn test_failed_connect_is_not_open() {
        let driver = driver_with_users(1);
        let counters = driver.counters();
        assert!(driver.connect(&Dsn::parse("memory://missing").unwrap()).is_err());
        let snap = counters.snapshot();
        assert_eq!(snap.connect_failures, 1);
        assert_eq!(snap.connects, 0);
        assert_eq!(snap.open_connections, 0);
    }
}
