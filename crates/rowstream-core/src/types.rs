//! Values, rows and batches.
//!
//! A `Row` is an ordered column → value mapping whose column list is shared
//! through an `Arc<Schema>`, so a stream of a million rows carries one schema.
//! Neither `Row` nor `RowBatch` exposes mutable access once built.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl Scalar {
    /// `None` for `Null`, which fits any nullable column.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view used by aggregations; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I64(i) => Some(*i as f64),
            Scalar::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Decode a textual cell (CSV field, CLI literal) as `data_type`.
    ///
    /// An empty cell is `Null`. Integral columns accept decimal spellings with
    /// a zero fraction (`"35.0"`), which is how DECIMAL(10,0) exports look.
    pub fn parse_as(text: &str, data_type: DataType) -> Result<Scalar> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Scalar::Null);
        }
        match data_type {
            DataType::Utf8 => Ok(Scalar::Str(text.to_string())),
            DataType::Boolean => text
                .to_ascii_lowercase()
                .parse::<bool>()
                .map(Scalar::Bool)
                .map_err(|_| Error::Schema(format!("cannot parse '{}' as bool", text))),
            DataType::Int64 => {
                if let Ok(i) = text.parse::<i64>() {
                    return Ok(Scalar::I64(i));
                }
                // 2^63 itself is the first float past i64::MAX
                const BOUND: f64 = 9_223_372_036_854_775_808.0;
                match text.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 && (-BOUND..BOUND).contains(&f) => {
                        Ok(Scalar::I64(f as i64))
                    }
                    Ok(f) if f.fract() == 0.0 => Err(Error::Schema(format!(
                        "'{}' is out of range for i64",
                        text
                    ))),
                    _ => Err(Error::Schema(format!("cannot parse '{}' as i64", text))),
                }
            }
            DataType::Float64 => text
                .parse::<f64>()
                .map(Scalar::F64)
                .map_err(|_| Error::Schema(format!("cannot parse '{}' as f64", text))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use Scalar::*;
        match self {
            Null => serde_json::Value::Null,
            Bool(b) => serde_json::Value::Bool(*b),
            I64(i) => serde_json::Value::from(*i),
            F64(f) => serde_json::Value::from(*f),
            Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::I64(i) => write!(f, "{}", i),
            Scalar::F64(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// One record pulled from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Scalar>,
}

impl Row {
    /// Build a row, checking arity and per-column types against `schema`.
    pub fn new(schema: Arc<Schema>, values: Vec<Scalar>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::Schema(format!(
                "row has {} values but schema has {} columns",
                values.len(),
                schema.len()
            )));
        }
        for (field, value) in schema.fields.iter().zip(&values) {
            match value.data_type() {
                None if !field.nullable => {
                    return Err(Error::Schema(format!(
                        "column '{}' is not nullable",
                        field.name
                    )))
                }
                Some(dt) if dt != field.data_type => {
                    return Err(Error::Schema(format!(
                        "column '{}' expects {:?}, got {:?}",
                        field.name, field.data_type, dt
                    )))
                }
                _ => {}
            }
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.schema.index_of(column).map(|idx| &self.values[idx])
    }

    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.schema.names().zip(self.values.iter())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Rows serialize as a JSON object in schema order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}

/// A bounded, ordered group of rows fetched in one round trip.
///
/// Batches own their rows; nothing fetched later can alter a batch already
/// handed to a consumer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowBatch {
    rows: Vec<Row>,
}

impl RowBatch {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Values of one column across the batch, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Scalar>> {
        self.rows
            .iter()
            .map(|r| {
                r.get(name)
                    .ok_or_else(|| Error::Schema(format!("column '{}' not found", name)))
            })
            .collect()
    }
}

impl IntoIterator for RowBatch {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowBatch {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
