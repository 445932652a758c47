//! Single-pass reductions in constant memory.
//!
//! An `Aggregator` folds each row into a fixed set of accumulators and never
//! keeps rows. It accepts streams of rows or batches; the first upstream error
//! aborts the whole aggregation and no partial result is returned.

use std::fmt;

use serde::Serialize;

use rowstream_core::aggregation::Aggregation;
use rowstream_core::error::{Error, Result};
use rowstream_core::predicate::{compare, CmpOp};
use rowstream_core::types::{Row, Scalar};

use crate::filter::IntoRows;

/// The outcome of one aggregation.
///
/// `Count` and an all-integer `Sum` are `I64`; `Avg` is always `F64` (`0.0`
/// over no values); `Min`/`Max` keep the column's type and are `Null` over no
/// values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateValue {
    pub aggregation: Aggregation,
    pub value: Scalar,
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.aggregation, self.value)
    }
}

#[derive(Debug, Clone)]
struct Accumulator {
    aggregation: Aggregation,
    rows: u64,
    values: u64,
    int_sum: i128,
    float_sum: f64,
    all_int: bool,
    min: Option<Scalar>,
    max: Option<Scalar>,
}

impl Accumulator {
    fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            rows: 0,
            values: 0,
            int_sum: 0,
            float_sum: 0.0,
            all_int: true,
            min: None,
            max: None,
        }
    }

    fn update(&mut self, row: &Row) -> Result<()> {
        self.rows += 1;
        let Some(column) = self.aggregation.column() else {
            return Ok(());
        };
        let value = row
            .get(column)
            .ok_or_else(|| Error::Schema(format!("column '{}' not found", column)))?;
        match value {
            Scalar::Null => return Ok(()),
            Scalar::I64(i) => {
                self.int_sum += i128::from(*i);
                self.float_sum += *i as f64;
            }
            Scalar::F64(x) => {
                self.all_int = false;
                self.float_sum += x;
            }
            other => {
                return Err(Error::Schema(format!(
                    "{} needs a numeric column, '{}' holds {}",
                    self.aggregation, column, other
                )))
            }
        }
        self.values += 1;
        match &self.aggregation {
            Aggregation::Min(_) => {
                if !is_beyond(self.min.as_ref(), value, CmpOp::Lt)? {
                    return Ok(());
                }
                self.min = Some(value.clone());
            }
            Aggregation::Max(_) => {
                if !is_beyond(self.max.as_ref(), value, CmpOp::Gt)? {
                    return Ok(());
                }
                self.max = Some(value.clone());
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> AggregateValue {
        let value = match &self.aggregation {
            Aggregation::Count => Scalar::I64(saturate(i128::from(self.rows))),
            Aggregation::Sum(_) => {
                if self.all_int {
                    match i64::try_from(self.int_sum) {
                        Ok(v) => Scalar::I64(v),
                        Err(_) => Scalar::F64(self.float_sum),
                    }
                } else {
                    Scalar::F64(self.float_sum)
                }
            }
            Aggregation::Avg(_) => Scalar::F64(self.mean()),
            Aggregation::Min(_) => self.min.clone().unwrap_or(Scalar::Null),
            Aggregation::Max(_) => self.max.clone().unwrap_or(Scalar::Null),
        };
        AggregateValue {
            aggregation: self.aggregation,
            value,
        }
    }

    fn mean(&self) -> f64 {
        if self.values == 0 {
            return 0.0;
        }
        if self.all_int {
            self.int_sum as f64 / self.values as f64
        } else {
            self.float_sum / self.values as f64
        }
    }
}

/// Whether `candidate` should replace the current extreme.
fn is_beyond(current: Option<&Scalar>, candidate: &Scalar, op: CmpOp) -> Result<bool> {
    match current {
        None => Ok(true),
        Some(cur) => compare(candidate, op, cur),
    }
}

fn saturate(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Evaluates several aggregations in one pass.
#[derive(Debug, Clone)]
pub struct Aggregator {
    accs: Vec<Accumulator>,
}

impl Aggregator {
    pub fn new(aggregations: impl IntoIterator<Item = Aggregation>) -> Self {
        Self {
            accs: aggregations.into_iter().map(Accumulator::new).collect(),
        }
    }

    pub fn update(&mut self, row: &Row) -> Result<()> {
        for acc in &mut self.accs {
            acc.update(row)?;
        }
        Ok(())
    }

    /// Results in the order the aggregations were given.
    pub fn finish(self) -> Vec<AggregateValue> {
        self.accs.into_iter().map(Accumulator::finish).collect()
    }

    /// Drain `stream` (rows or batches) and finish.
    pub fn consume<I, T>(mut self, stream: I) -> Result<Vec<AggregateValue>>
    where
        I: IntoIterator<Item = Result<T>>,
        T: IntoRows,
    {
        for item in stream {
            for row in item?.into_rows() {
                self.update(&row)?;
            }
        }
        Ok(self.finish())
    }
}

fn single<I, T>(aggregation: Aggregation, stream: I) -> Result<Scalar>
where
    I: IntoIterator<Item = Result<T>>,
    T: IntoRows,
{
    Aggregator::new([aggregation])
        .consume(stream)?
        .pop()
        .map(|v| v.value)
        .ok_or_else(|| Error::Invariant("aggregator returned no value".into()))
}

/// Number of rows.
pub fn count<I, T>(stream: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<T>>,
    T: IntoRows,
{
    let mut n = 0u64;
    for item in stream {
        n += item?.into_rows().count() as u64;
    }
    Ok(n)
}

/// Sum of a numeric column; `I64(0)` over no values.
pub fn sum<I, T>(stream: I, column: &str) -> Result<Scalar>
where
    I: IntoIterator<Item = Result<T>>,
    T: IntoRows,
{
    single(Aggregation::Sum(column.to_string()), stream)
}

/// Mean of a numeric column; `0.0` over no values.
pub fn average<I, T>(stream: I, column: &str) -> Result<f64>
where
    I: IntoIterator<Item = Result<T>>,
    T: IntoRows,
{
    let value = single(Aggregation::Avg(column.to_string()), stream)?;
    value
        .as_f64()
        .ok_or_else(|| Error::Invariant(format!("average produced {}", value)))
}

/// Plain numbers `average_values` can reduce.
pub trait Numeric: Copy {
    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric {
    ($($t:ty),*) => {
        $(impl Numeric for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_numeric!(i32, i64, u32, u64, f32, f64);

/// Mean of a stream of numbers; `0.0` when the stream is empty.
pub fn average_values<I, N>(values: I) -> Result<f64>
where
    I: IntoIterator<Item = Result<N>>,
    N: Numeric,
{
    let mut total = 0.0f64;
    let mut n = 0u64;
    for v in values {
        total += v?.to_f64();
        n += 1;
    }
    Ok(if n == 0 { 0.0 } else { total / n as f64 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstream_core::schema::{DataType, Field, Schema};
    use rowstream_core::types::RowBatch;
    use std::sync::Arc;

    fn scored(values: &[Scalar]) -> Vec<Result<Row>> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("score", DataType::Float64, true),
        ]));
        values
            .iter()
            .map(|v| Row::new(Arc::clone(&schema), vec![Scalar::from("x"), v.clone()]))
            .collect()
    }

    #[test]
    fn test_multiple_aggregations_one_pass() {
        let rows = scored(&[Scalar::F64(1.5), Scalar::Null, Scalar::F64(4.5), Scalar::F64(3.0)]);
        let out = Aggregator::new([
            Aggregation::Count,
            Aggregation::Sum("score".into()),
            Aggregation::Avg("score".into()),
            Aggregation::Min("score".into()),
            Aggregation::Max("score".into()),
        ])
        .consume(rows)
        .unwrap();

        let values: Vec<Scalar> = out.into_iter().map(|v| v.value).collect();
        assert_eq!(
            values,
            vec![
                Scalar::I64(4),
                Scalar::F64(9.0),
                Scalar::F64(3.0),
                Scalar::F64(1.5),
                Scalar::F64(4.5),
            ]
        );
    }

    #[test]
    fn test_empty_stream_defaults() {
        let empty = Vec::<Result<Row>>::new;
        assert_eq!(average(empty(), "score").unwrap(), 0.0);
        assert_eq!(sum(empty(), "score").unwrap(), Scalar::I64(0));
        assert_eq!(count(empty()).unwrap(), 0);

        let out = Aggregator::new([Aggregation::Max("score".into())])
            .consume(empty())
            .unwrap();
        assert_eq!(out[0].value, Scalar::Null);
    }

    #[test]
    fn test_batches_and_rows_agree() {
        let rows: Vec<Row> = scored(&[Scalar::F64(2.0), Scalar::F64(4.0), Scalar::F64(9.0)])
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let batches = vec![
            Ok(RowBatch::new(rows[..2].to_vec())),
            Ok(RowBatch::new(rows[2..].to_vec())),
        ];
        let by_rows = average(rows.into_iter().map(Ok::<Row, Error>), "score").unwrap();
        let by_batches = average(batches, "score").unwrap();
        assert_eq!(by_rows, 5.0);
        assert_eq!(by_rows, by_batches);
    }

    #[test]
    fn test_upstream_error_aborts() {
        let mut rows = scored(&[Scalar::F64(1.0)]);
        rows.push(Err(Error::Fetch("connection reset".into())));
        rows.extend(scored(&[Scalar::F64(2.0)]));
        assert!(average(rows, "score").unwrap_err().is_fetch());
    }

    #[test]
    fn test_non_numeric_column_is_schema_error() {
        let rows = scored(&[Scalar::F64(1.0)]);
        let err = sum(rows, "name").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_average_values() {
        let ages = [35i64, 42, 28, 45, 39].map(Ok::<i64, Error>);
        assert!((average_values(ages).unwrap() - 37.8).abs() < 1e-9);
        assert_eq!(average_values(Vec::<Result<i64>>::new()).unwrap(), 0.0);
    }
}
