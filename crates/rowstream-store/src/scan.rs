//! Cursor-side row production shared by the bundled drivers.
//!
//! A driver supplies raw records in table order through `RawRows`; `Scan`
//! applies the bound statement (filters, projection, LIMIT) one record at a
//! time, so at most one source record is held at any point.

use rowstream_core::types::{Row, Scalar};

use crate::error::Result;
use crate::sql::Plan;

/// A forward-only source of records in source-table column order.
pub trait RawRows: Send {
    fn next_values(&mut self) -> Result<Option<Vec<Scalar>>>;
}

pub struct Scan<R> {
    source: R,
    plan: Plan,
    emitted: u64,
}

impl<R: RawRows> Scan<R> {
    pub fn new(source: R, plan: Plan) -> Self {
        Self {
            source,
            plan,
            emitted: 0,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.plan.limit().is_some_and(|limit| self.emitted >= limit) {
            return Ok(None);
        }
        while let Some(values) = self.source.next_values()? {
            if let Some(row) = self.plan.apply(values)? {
                self.emitted += 1;
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}
