#![forbid(unsafe_code)]
//! rowstream-store: the store interface streams pull from, plus bundled drivers.
//!
//! A `Driver` turns a DSN into a `Connection`; a connection hands out
//! `Cursor`s; a cursor executes one SELECT at a time and returns its rows
//! through single-row or multi-row fetches. Nothing here buffers a result set:
//! both bundled drivers produce rows on demand.
//!
//! - `memory`: named in-process databases (tests, demos)
//! - `csv`: one `<table>.csv` per table under a directory
//! - `registry`: pick a driver by DSN scheme
//! - `tracking` / `failpoints`: decorators that count lifecycle events and
//!   inject faults, usable around any driver

pub mod csv;
pub mod driver;
pub mod dsn;
pub mod error;
pub mod failpoints;
pub mod memory;
pub mod registry;
pub mod scan;
pub mod sql;
pub mod tracking;

pub use driver::{Connection, Cursor, Driver};
pub use dsn::Dsn;
pub use error::{Result, StoreError};
pub use failpoints::{FaultPlan, FaultyDriver};
pub use memory::MemoryDriver;
pub use registry::DriverRegistry;
pub use tracking::{LifecycleCounters, TrackingDriver};

pub use self::csv::CsvDriver;
