//! Streaming aggregations over a single numeric column (or rows for `Count`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

impl Aggregation {
    /// Column the aggregation reads; `None` for `Count`.
    pub fn column(&self) -> Option<&str> {
        match self {
            Aggregation::Count => None,
            Aggregation::Sum(c)
            | Aggregation::Avg(c)
            | Aggregation::Min(c)
            | Aggregation::Max(c) => Some(c),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Count => write!(f, "COUNT(*)"),
            Aggregation::Sum(col) => write!(f, "SUM({})", col),
            Aggregation::Avg(col) => write!(f, "AVG({})", col),
            Aggregation::Min(col) => write!(f, "MIN({})", col),
            Aggregation::Max(col) => write!(f, "MAX({})", col),
        }
    }
}

/// Accepts `count`, `sum:age`, `avg:age`, `min:age`, `max:age`.
impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, col) = match s.split_once(':') {
            Some((k, c)) => (k.trim(), Some(c.trim().to_string())),
            None => (s.trim(), None),
        };
        let need_col = |col: Option<String>| {
            col.filter(|c| !c.is_empty())
                .ok_or_else(|| Error::Config(format!("aggregation '{}' needs a column", s)))
        };
        match kind.to_ascii_lowercase().as_str() {
            "count" => Ok(Aggregation::Count),
            "sum" => Ok(Aggregation::Sum(need_col(col)?)),
            "avg" | "average" => Ok(Aggregation::Avg(need_col(col)?)),
            "min" => Ok(Aggregation::Min(need_col(col)?)),
            "max" => Ok(Aggregation::Max(need_col(col)?)),
            other => Err(Error::Config(format!("unknown aggregation '{}'", other))),
        }
    }
}
