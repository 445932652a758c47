//! Simple comparisons: `column OP literal` where OP ∈ {==, =, !=, <>, <, <=, >, >=}.
//!
//! Shared by the drivers' WHERE clauses and by client-side filter stages so
//! both sides agree on what `age > 25` means.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Every spelling `parse` accepts besides `<>`.
    const SPELLINGS: [(&'static str, CmpOp); 7] = [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
        ("=", CmpOp::Eq),
    ];

    pub fn parse(token: &str) -> Option<CmpOp> {
        match token {
            "<>" => Some(CmpOp::Ne),
            _ => Self::SPELLINGS
                .iter()
                .find(|(s, _)| *s == token)
                .map(|(_, op)| *op),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn holds(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a simple predicate like "age > 18" or "name == 'Al<ice'".
///
/// The operator is the first one found outside quotes, longest spelling
/// first, so `<=` is never read as `<` and `<>` is `!=`. Returns
/// `(column, op, literal text)`; the literal is typed later against the value
/// it is compared with.
pub fn parse_simple_predicate(expr: &str) -> Result<(String, CmpOp, String)> {
    let unparseable = || Error::Schema(format!("unparseable predicate: {}", expr));
    let (pos, len, op) = find_operator(expr).ok_or_else(unparseable)?;
    let col = expr[..pos].trim();
    let lit = expr[pos + len..].trim();
    if col.is_empty() || lit.is_empty() {
        return Err(unparseable());
    }
    Ok((col.to_string(), op, lit.to_string()))
}

/// Byte offset, length and meaning of the first operator outside quotes.
fn find_operator(expr: &str) -> Option<(usize, usize, CmpOp)> {
    let mut quote: Option<char> = None;
    for (pos, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if matches!(c, '=' | '!' | '<' | '>') => {
                let rest = &expr[pos..];
                let two = rest.get(..2).and_then(CmpOp::parse);
                if let Some(op) = two {
                    return Some((pos, 2, op));
                }
                return CmpOp::parse(&rest[..1]).map(|op| (pos, 1, op));
            }
            None => {}
        }
    }
    None
}

/// Compare two typed values. Any comparison involving `Null` is false.
///
/// Integers and floats compare numerically; other mixed-type pairs are an
/// error rather than silently false.
pub fn compare(lhs: &Scalar, op: CmpOp, rhs: &Scalar) -> Result<bool> {
    use Scalar::*;

    let ord = match (lhs, rhs) {
        (Null, _) | (_, Null) => return Ok(false),
        (I64(a), I64(b)) => a.cmp(b),
        (Str(a), Str(b)) => a.cmp(b),
        (Bool(a), Bool(b)) => {
            if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                return Err(Error::Schema(format!("unsupported op '{}' for bool", op)));
            }
            a.cmp(b)
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => match x.partial_cmp(&y) {
                Some(ord) => ord,
                None => return Ok(false),
            },
            _ => {
                return Err(Error::Schema(format!(
                    "cannot compare {} with {}",
                    lhs, rhs
                )))
            }
        },
    };
    Ok(op.holds(ord))
}

/// Compare a value with an untyped literal, typing the literal after the value.
pub fn compare_literal(value: &Scalar, op: CmpOp, literal: &str) -> Result<bool> {
    let literal = literal.trim();
    let rhs = match value {
        Scalar::Null => return Ok(false),
        Scalar::Bool(_) => literal
            .parse::<bool>()
            .map(Scalar::Bool)
            .map_err(|_| Error::Schema(format!("cannot parse '{}' as bool", literal)))?,
        Scalar::I64(_) | Scalar::F64(_) => {
            if let Ok(i) = literal.parse::<i64>() {
                Scalar::I64(i)
            } else {
                literal
                    .parse::<f64>()
                    .map(Scalar::F64)
                    .map_err(|_| Error::Schema(format!("cannot parse '{}' as number", literal)))?
            }
        }
        Scalar::Str(_) => Scalar::Str(unquote(literal).to_string()),
    };
    compare(value, op, &rhs)
}

fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
