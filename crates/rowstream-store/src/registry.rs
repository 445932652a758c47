//! Driver selection by DSN scheme.

use std::collections::HashMap;
use std::sync::Arc;

use crate::csv::CsvDriver;
use crate::driver::{Connection, Driver};
use crate::dsn::Dsn;
use crate::error::{Result, StoreError};
use crate::memory::MemoryDriver;

/// Maps DSN schemes (`memory`, `csv`, ...) to drivers.
///
/// The registry is itself a `Driver`, so callers holding one never need to
/// know which store a DSN points at.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Empty registry; every connect fails until drivers are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// `memory://` served by `memory`, `csv://` by a default `CsvDriver`.
    pub fn with_defaults(memory: MemoryDriver) -> Self {
        let mut reg = Self::new();
        reg.register("memory", Arc::new(memory));
        reg.register("csv", Arc::new(CsvDriver::new()));
        reg
    }

    /// Register `driver` for `scheme`, replacing any previous entry.
    pub fn register(&mut self, scheme: &str, driver: Arc<dyn Driver>) {
        self.drivers.insert(scheme.to_ascii_lowercase(), driver);
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.get(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut s: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        s.sort_unstable();
        s
    }
}

impl Driver for DriverRegistry {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        let driver = self
            .get(dsn.scheme())
            .ok_or_else(|| StoreError::UnsupportedScheme(dsn.scheme().to_string()))?;
        driver.connect(dsn)
    }
}
