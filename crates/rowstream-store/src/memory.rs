//! In-memory store.
//!
//! Databases are named (`memory://<name>`) and hold tables of typed records.
//! Inserting into a table never disturbs cursors already scanning it: each
//! execute snapshots the table's `Arc`, and writers copy on write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use rowstream_core::record::UserRecord;
use rowstream_core::schema::{Schema, USER_DATA_TABLE};
use rowstream_core::types::{Row, Scalar};

use crate::driver::{Connection, Cursor, Driver};
use crate::dsn::Dsn;
use crate::error::{Result, StoreError};
use crate::scan::{RawRows, Scan};
use crate::sql::Select;

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: Arc<Schema>,
    rows: Vec<Vec<Scalar>>,
}

type Database = HashMap<String, Arc<MemoryTable>>;

/// Thread-safe in-memory store, cheap to clone (clones share databases).
#[derive(Clone, Default)]
pub struct MemoryDriver {
    databases: Arc<RwLock<HashMap<String, Database>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty database. Idempotent.
    pub fn create_database(&self, name: &str) -> Result<()> {
        let mut dbs = self.write()?;
        dbs.entry(name.to_string()).or_default();
        Ok(())
    }

    /// Create (or replace) a table, creating the database if needed.
    pub fn create_table(&self, database: &str, table: &str, schema: Schema) -> Result<()> {
        let mut dbs = self.write()?;
        dbs.entry(database.to_string()).or_default().insert(
            table.to_string(),
            Arc::new(MemoryTable {
                schema: Arc::new(schema),
                rows: Vec::new(),
            }),
        );
        Ok(())
    }

    /// Append records in table column order. Returns the number inserted.
    ///
    /// Every record is checked against the table schema before any is stored.
    pub fn insert(&self, database: &str, table: &str, rows: Vec<Vec<Scalar>>) -> Result<usize> {
        let mut dbs = self.write()?;
        let db = dbs
            .get_mut(database)
            .ok_or_else(|| StoreError::UnknownDatabase(database.to_string()))?;
        let entry = db
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        for values in &rows {
            Row::new(Arc::clone(&entry.schema), values.clone())?;
        }
        let n = rows.len();
        Arc::make_mut(entry).rows.extend(rows);
        Ok(n)
    }

    /// Append users to `user_data`, creating the table on first use.
    pub fn insert_users(&self, database: &str, users: &[UserRecord]) -> Result<usize> {
        let exists = self
            .read()?
            .get(database)
            .is_some_and(|db| db.contains_key(USER_DATA_TABLE));
        if !exists {
            self.create_table(database, USER_DATA_TABLE, Schema::user_data())?;
        }
        self.insert(
            database,
            USER_DATA_TABLE,
            users.iter().map(UserRecord::to_values).collect(),
        )
    }

    pub fn row_count(&self, database: &str, table: &str) -> Result<usize> {
        let dbs = self.read()?;
        dbs.get(database)
            .ok_or_else(|| StoreError::UnknownDatabase(database.to_string()))?
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn table(&self, database: &str, table: &str) -> Result<Arc<MemoryTable>> {
        let dbs = self.read()?;
        dbs.get(database)
            .ok_or_else(|| StoreError::UnknownDatabase(database.to_string()))?
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Database>>> {
        self.databases
            .read()
            .map_err(|_| StoreError::Poisoned("memory databases"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Database>>> {
        self.databases
            .write()
            .map_err(|_| StoreError::Poisoned("memory databases"))
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        let database = dsn.database()?.to_string();
        if !self.read()?.contains_key(&database) {
            return Err(StoreError::UnknownDatabase(database));
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(database = %database, "memory store connected");
        Ok(Box::new(MemoryConnection {
            driver: self.clone(),
            database,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct MemoryConnection {
    driver: MemoryDriver,
    database: String,
    closed: Arc<AtomicBool>,
}

impl Connection for MemoryConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        if self.is_closed() {
            return Err(StoreError::Closed("connection"));
        }
        Ok(Box::new(MemoryCursor {
            driver: self.driver.clone(),
            database: self.database.clone(),
            conn_closed: Arc::clone(&self.closed),
            closed: false,
            scan: None,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct TableRows {
    table: Arc<MemoryTable>,
    pos: usize,
}

impl RawRows for TableRows {
    fn next_values(&mut self) -> Result<Option<Vec<Scalar>>> {
        let next = self.table.rows.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        Ok(next)
    }
}

struct MemoryCursor {
    driver: MemoryDriver,
    database: String,
    conn_closed: Arc<AtomicBool>,
    closed: bool,
    scan: Option<Scan<TableRows>>,
}

impl MemoryCursor {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed("cursor"));
        }
        if self.conn_closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed("connection"));
        }
        Ok(())
    }
}

impl Cursor for MemoryCursor {
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()> {
        self.ensure_usable()?;
        self.scan = None;
        let select = Select::parse(sql)?;
        let table = self.driver.table(&self.database, &select.table)?;
        let plan = select.bind(&table.schema, params)?;
        self.scan = Some(Scan::new(TableRows { table, pos: 0 }, plan));
        Ok(())
    }

    fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.ensure_usable()?;
        self.scan
            .as_mut()
            .ok_or(StoreError::NotExecuted)?
            .next_row()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.scan = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
