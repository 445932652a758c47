//! CSV-backed store: `csv:///<dir>` where table `t` lives in `<dir>/t.csv`.
//!
//! Files are read record by record through `csv::Reader`; a cursor holds one
//! decoded record at a time no matter how large the file is. Columns are typed
//! by the registered table schema (`user_data` is registered by default);
//! tables without a registered schema are read as nullable UTF-8 columns named
//! after the header row.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use csv::{Reader, ReaderBuilder, StringRecord};

use rowstream_core::schema::{DataType, Field, Schema, USER_DATA_TABLE};
use rowstream_core::types::{Row, Scalar};

use crate::driver::{Connection, Cursor, Driver};
use crate::dsn::Dsn;
use crate::error::{Result, StoreError};
use crate::scan::{RawRows, Scan};
use crate::sql::Select;

#[derive(Clone)]
pub struct CsvDriver {
    schemas: Arc<HashMap<String, Arc<Schema>>>,
    delimiter: u8,
}

impl Default for CsvDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvDriver {
    /// Driver with the `user_data` schema registered.
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(USER_DATA_TABLE.to_string(), Arc::new(Schema::user_data()));
        Self {
            schemas: Arc::new(schemas),
            delimiter: b',',
        }
    }

    /// Register (or replace) the schema used to type `table`.
    pub fn with_table(mut self, table: &str, schema: Schema) -> Self {
        Arc::make_mut(&mut self.schemas).insert(table.to_string(), Arc::new(schema));
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Driver for CsvDriver {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Connection>> {
        let dir = dsn.path()?;
        if !dir.is_dir() {
            return Err(StoreError::InvalidDsn {
                dsn: dsn.to_string(),
                reason: format!("'{}' is not a directory", dir.display()),
            });
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(dir = %dir.display(), "csv store connected");
        Ok(Box::new(CsvConnection {
            driver: self.clone(),
            dir,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct CsvConnection {
    driver: CsvDriver,
    dir: PathBuf,
    closed: Arc<AtomicBool>,
}

impl Connection for CsvConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor>> {
        if self.is_closed() {
            return Err(StoreError::Closed("connection"));
        }
        Ok(Box::new(CsvCursor {
            driver: self.driver.clone(),
            dir: self.dir.clone(),
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

/// Decodes CSV records into table-ordered values.
struct CsvRows {
    reader: Reader<File>,
    record: StringRecord,
    schema: Arc<Schema>,
    /// For each schema column, its position in the file's header.
    positions: Vec<usize>,
}

impl RawRows for CsvRows {
    fn next_values(&mut self) -> Result<Option<Vec<Scalar>>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map(|p| p.line()).unwrap_or(0);
        let mut values = Vec::with_capacity(self.positions.len());
        for (field, &pos) in self.schema.fields.iter().zip(&self.positions) {
            let text = self.record.get(pos).ok_or_else(|| StoreError::Decode {
                line,
                reason: format!("missing field '{}'", field.name),
            })?;
            let value =
                Scalar::parse_as(text, field.data_type).map_err(|e| StoreError::Decode {
                    line,
                    reason: e.to_string(),
                })?;
            if value.is_null() && !field.nullable {
                return Err(StoreError::Decode {
                    line,
                    reason: format!("empty value for non-nullable '{}'", field.name),
                });
            }
            values.push(value);
        }
        Ok(Some(values))
    }
}

struct CsvCursor {
    driver: CsvDriver,
    dir: PathBuf,
    conn_closed: Arc<AtomicBool>,
    closed: bool,
    scan: Option<Scan<CsvRows>>,
}

impl CsvCursor {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed("cursor"));
        }
        if self.conn_closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed("connection"));
        }
        Ok(())
    }

    fn open_table(&self, table: &str) -> Result<CsvRows> {
        let path = self.dir.join(format!("{}.csv", table));
        if !path.is_file() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.driver.delimiter)
            .trim(csv::Trim::All)
            .from_path(&path)?;
        let headers = reader.headers()?.clone();

        let schema = match self.driver.schemas.get(table) {
            Some(schema) => Arc::clone(schema),
            None => Arc::new(Schema::new(
                headers
                    .iter()
                    .map(|h| Field::new(h, DataType::Utf8, true))
                    .collect(),
            )),
        };
        let positions = schema
            .fields
            .iter()
            .map(|f| {
                headers.iter().position(|h| h == f.name).ok_or_else(|| {
                    StoreError::UnknownColumn(format!("{} (absent from {})", f.name, path.display()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CsvRows {
            reader,
            record: StringRecord::new(),
            schema,
            positions,
        })
    }
}

impl Cursor for CsvCursor {
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> Result<()> {
        self.ensure_usable()?;
        self.scan = None;
        let select = Select::parse(sql)?;
        let rows = self.open_table(&select.table)?;
        let plan = select.bind(&rows.schema, params)?;
        self.scan = Some(Scan::new(rows, plan));
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
        // Dropping the scan closes the file handle.
        self.scan = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(dir: &std::path::Path, name: &str, body: &str) {
        let mut f = File::create(dir.join(format!("{name}.csv"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn cursor_for(dir: &std::path::Path) -> Box<dyn Cursor> {
        let dsn = Dsn::parse(&format!("csv://{}", dir.display())).unwrap();
        CsvDriver::new().connect(&dsn).unwrap().cursor().unwrap()
    }

    #[test]
    fn test_csv_reads_typed_user_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            USER_DATA_TABLE,
            "user_id,name,email,age\n\
             00000000-0000-0000-0000-000000000001,Ann,ann@example.com,35\n\
             00000000-0000-0000-0000-000000000002,Bo,bo@example.com,42.0\n",
        );
        let mut cursor = cursor_for(dir.path());
        cursor.execute("SELECT * FROM user_data", &[]).unwrap();

        let rows = cursor.fetch_many(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("age"), Some(&Scalar::I64(35)));
        assert_eq!(rows[1].get("age"), Some(&Scalar::I64(42)));
        assert_eq!(rows[1].get("name"), Some(&Scalar::Str("Bo".into())));
    }

    #[test]
    fn test_csv_header_order_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            USER_DATA_TABLE,
            "age,email,name,user_id\n30,c@example.com,Cy,00000000-0000-0000-0000-000000000003\n",
        );
        let mut cursor = cursor_for(dir.path());
        cursor.execute("SELECT user_id, age FROM user_data", &[]).unwrap();
        let row = cursor.fetch_one().unwrap().unwrap();
        assert_eq!(row.get("age"), Some(&Scalar::I64(30)));
        assert_eq!(
            row.get("user_id").and_then(Scalar::as_str),
            Some("00000000-0000-0000-0000-000000000003")
        );
    }

    #[test]
    fn test_csv_bad_age_is_decode_error_at_fetch() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            USER_DATA_TABLE,
            "user_id,name,email,age\nid-1,Ann,ann@example.com,35\nid-2,Bo,bo@example.com,old\n",
        );
        let mut cursor = cursor_for(dir.path());
        cursor.execute("SELECT * FROM user_data", &[]).unwrap();
        assert!(cursor.fetch_one().unwrap().is_some());
        assert!(matches!(
            cursor.fetch_one(),
            Err(StoreError::Decode { line: 3, .. })
        ));
    }

    #[test]
    fn test_csv_unregistered_table_reads_as_text() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "notes", "title,body\nhello,world\n");
        let mut cursor = cursor_for(dir.path());
        cursor
            .execute("SELECT body FROM notes WHERE title = ?", &[Scalar::from("hello")])
            .unwrap();
        let row = cursor.fetch_one().unwrap().unwrap();
        assert_eq!(row.get("body"), Some(&Scalar::Str("world".into())));
    }

    #[test]
    fn test_csv_missing_dir_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let dsn = Dsn::parse(&format!("csv://{}", missing.display())).unwrap();
        assert!(matches!(
            CsvDriver::new().connect(&dsn),
            Err(StoreError::InvalidDsn { .. })
        ));

        let mut cursor = cursor_for(dir.path());
        assert!(matches!(
            cursor.execute("SELECT * FROM user_data", &[]),
            Err(StoreError::UnknownTable(_))
        ));
    }
}
