//! Lazy row filters over row or batch streams.
//!
//! A `FilterStage` pulls one upstream element at a time (a `Row`, or a whole
//! `RowBatch` which it then walks row by row) and yields the rows its
//! predicate accepts, in upstream order. Stages nest: filtering a filtered
//! stream behaves exactly like filtering once with the conjunction.

use std::iter::FusedIterator;

use rowstream_core::error::{Error, Result};
use rowstream_core::predicate::{compare_literal, parse_simple_predicate, CmpOp};
use rowstream_core::types::{Row, RowBatch};

/// Upstream elements a filter can walk row by row.
pub trait IntoRows {
    type Rows: Iterator<Item = Row>;

    fn into_rows(self) -> Self::Rows;
}

impl IntoRows for Row {
    type Rows = std::iter::Once<Row>;

    fn into_rows(self) -> Self::Rows {
        std::iter::once(self)
    }
}

impl IntoRows for RowBatch {
    type Rows = std::vec::IntoIter<Row>;

    fn into_rows(self) -> Self::Rows {
        RowBatch::into_rows(self).into_iter()
    }
}

/// A test applied to each row. Errors end the filtered stream.
pub trait RowPredicate {
    fn test(&mut self, row: &Row) -> Result<bool>;
}

impl<F> RowPredicate for F
where
    F: FnMut(&Row) -> bool,
{
    fn test(&mut self, row: &Row) -> Result<bool> {
        Ok(self(row))
    }
}

/// Accepts every row; used to flatten batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RowPredicate for AcceptAll {
    fn test(&mut self, _row: &Row) -> Result<bool> {
        Ok(true)
    }
}

/// Both predicates hold. The second is not evaluated when the first fails.
#[derive(Debug, Clone)]
pub struct And<A, B> {
    first: A,
    second: B,
}

pub fn and<A: RowPredicate, B: RowPredicate>(first: A, second: B) -> And<A, B> {
    And { first, second }
}

impl<A: RowPredicate, B: RowPredicate> RowPredicate for And<A, B> {
    fn test(&mut self, row: &Row) -> Result<bool> {
        Ok(self.first.test(row)? && self.second.test(row)?)
    }
}

/// `column OP literal`, with the literal typed after the column's value.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    column: String,
    op: CmpOp,
    literal: String,
}

impl Comparison {
    pub fn new(column: impl Into<String>, op: CmpOp, literal: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            literal: literal.into(),
        }
    }

    /// Parse `"age > 25"`, `"name == 'Ann'"`, ...
    pub fn parse(expr: &str) -> Result<Self> {
        let (column, op, literal) = parse_simple_predicate(expr)?;
        Ok(Self::new(column, op, literal))
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn op(&self) -> CmpOp {
        self.op
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.literal)
    }
}

impl RowPredicate for Comparison {
    fn test(&mut self, row: &Row) -> Result<bool> {
        let value = row
            .get(&self.column)
            .ok_or_else(|| Error::Schema(format!("column '{}' not found", self.column)))?;
        compare_literal(value, self.op, &self.literal)
    }
}

/// Rows of `upstream` that satisfy `predicate`.
///
/// Holds at most the unvisited rest of the current upstream element. The
/// first error, from upstream or from the predicate, is yielded once and ends
/// the stage; upstream is released when the stage is dropped.
pub struct FilterStage<I, T: IntoRows, P> {
    upstream: I,
    current: Option<T::Rows>,
    predicate: P,
    done: bool,
}

impl<I, T, P> FilterStage<I, T, P>
where
    I: Iterator<Item = Result<T>>,
    T: IntoRows,
    P: RowPredicate,
{
    pub fn new(upstream: I, predicate: P) -> Self {
        Self {
            upstream,
            current: None,
            predicate,
            done: false,
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.upstream
    }

    pub fn get_mut(&mut self) -> &mut I {
        &mut self.upstream
    }

    pub fn into_inner(self) -> I {
        self.upstream
    }
}

impl<I, T, P> Iterator for FilterStage<I, T, P>
where
    I: Iterator<Item = Result<T>>,
    T: IntoRows,
    P: RowPredicate,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            while let Some(row) = self.current.as_mut().and_then(Iterator::next) {
                match self.predicate.test(&row) {
                    Ok(true) => return Some(Ok(row)),
                    Ok(false) => {}
                    Err(e) => {
                        self.done = true;
                        self.current = None;
                        return Some(Err(e));
                    }
                }
            }
            match self.upstream.next() {
                Some(Ok(item)) => self.current = Some(item.into_rows()),
                Some(Err(e)) => {
                    self.done = true;
                    self.current = None;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    self.current = None;
                    return None;
                }
            }
        }
    }
}

impl<I, T, P> FusedIterator for FilterStage<I, T, P>
where
    I: Iterator<Item = Result<T>>,
    T: IntoRows,
    P: RowPredicate,
{
}

/// Filter combinators for any stream of rows or batches.
pub trait StreamExt: Iterator + Sized {
    fn filter_rows<T, P>(self, predicate: P) -> FilterStage<Self, T, P>
    where
        Self: Iterator<Item = Result<T>>,
        T: IntoRows,
        P: RowPredicate,
    {
        FilterStage::new(self, predicate)
    }

    /// `filter_rows` for closures, so their argument type is inferred.
    fn filter_by<T, F>(self, f: F) -> FilterStage<Self, T, F>
    where
        Self: Iterator<Item = Result<T>>,
        T: IntoRows,
        F: FnMut(&Row) -> bool,
    {
        FilterStage::new(self, f)
    }

    /// Filter by a parsed `"column op literal"` expression.
    fn where_expr<T>(self, expr: &str) -> Result<FilterStage<Self, T, Comparison>>
    where
        Self: Iterator<Item = Result<T>>,
        T: IntoRows,
    {
        Ok(FilterStage::new(self, Comparison::parse(expr)?))
    }

    /// Every row, flattening batches.
    fn rows<T>(self) -> FilterStage<Self, T, AcceptAll>
    where
        Self: Iterator<Item = Result<T>>,
        T: IntoRows,
    {
        FilterStage::new(self, AcceptAll)
    }
}

impl<I: Iterator> StreamExt for I {}
