//! Deterministic fault injection around any driver.
//!
//! A `FaultPlan` names the phases that fail; `FaultyDriver` applies it to
//! every connection it opens. Injected failures surface as
//! `StoreError::Injected`, so callers see them the same way they would see a
//! real store fault in that phase.

use rowstream_core::types::{Row, Scalar};

use crate::driver::{Connection, Cursor, Driver};
use crate::dsn::Dsn;
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    connect: bool,
    cursor: bool,
    execute: bool,
    fetch_after: Option<usize>,
}

impl FaultPlan {
    /// No faults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(mut self) -> Self {
        self.connect = true;
        self
    }

    pub fn fail_cursor(mut self) -> Self {
        self.cursor = true;
        self
    }

    pub fn fail_execute(mut self) -> Self {
        self.execute = true;
        self
    }

    /// Fail the first fetch issued once at least `rows` rows have been
    /// delivered by the cursor.
    ///
    /// Fetches started below the threshold run normally, so a multi-row fetch
    /// may carry the count past it; fetches are never shortened, which would
    /// read as exhaustion to a batching caller.
    pub fn fail_fetch_after(mut self, rows: usize) -> Self {
        self.fetch_after = Some(rows);
        self
    }
}

pub struct FaultyDriver<D> {
    inner: D,
    plan: FaultPlan,
}

impl<D: Driver> FaultyDriver<D> {
    pub fn new(inner: D, plan: FaultPlan) -> Self {
        Self { inner, plan }
    }

    pub fn plan(&self) -> FaultPlan {
        self.plan
    }
}

fn injected(phase: &str) -> StoreError {
    #[cfg(feature = "tracing")]
    tracing::debug!(phase, "injecting store fault");
    StoreError::Injected(format!("{} fault", phase))
}

impl<D: Driver> Driver for FaultyDriver<D> {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        if self.plan.connect {
            return Err(injected("connect"));
        }
        let inner = self.inner.connect(dsn)?;
        Ok(Box::new(FaultyConnection {
            inner,
            plan: self.plan,
        }))
    }
}

struct FaultyConnection {
    inner: Box<dyn Connection>,
    plan: FaultPlan,
}

impl Connection for FaultyConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        if self.plan.cursor {
            return Err(injected("cursor"));
        }
        let inner = self.inner.cursor()?;
        Ok(Box::new(FaultyCursor {
            inner,
            plan: self.plan,
            delivered: 0,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

struct FaultyCursor {
    inner: Box<dyn Cursor>,
    plan: FaultPlan,
    delivered: usize,
}

impl FaultyCursor {
    fn check_fetch(&self) -> Result<()> {
        match self.plan.fetch_after {
            Some(k) if self.delivered >= k => Err(injected("fetch")),
            _ => Ok(()),
        }
    }
}

impl Cursor for FaultyCursor {
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()> {
        if self.plan.execute {
            return Err(injected("execute"));
        }
        self.delivered = 0;
        self.inner.execute(sql, params)
    }

    fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.check_fetch()?;
        let row = self.inner.fetch_one()?;
        if row.is_some() {
            self.delivered += 1;
        }
        Ok(row)
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        self.check_fetch()?;
        let rows = self.inner.fetch_many(n)?;
        self.delivered += rows.len();
        Ok(rows)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
