//! The SELECT dialect understood by the bundled drivers.
//!
//! ```text
//! SELECT ( * | col [, col]* ) FROM table
//!        [ WHERE col op value [ AND col op value ]* ]
//!        [ LIMIT n ] [;]
//! ```
//!
//! `value` is an integer, a float, a `'quoted string'`, `true`/`false`, or a
//! `?` placeholder bound positionally at execute time. Keywords are
//! case-insensitive; identifiers are not.

use std::sync::Arc;

use rowstream_core::predicate::{compare, CmpOp};
use rowstream_core::schema::{DataType, Schema};
use rowstream_core::types::{Row, Scalar};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Scalar),
    /// Zero-based position among the statement's `?` placeholders.
    Param(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CmpOp,
    pub operand: Operand,
}

/// A parsed, unbound SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub table: String,
    pub conditions: Vec<Condition>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Star,
    Comma,
    Semicolon,
    Placeholder,
    Op(CmpOp),
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Placeholder);
                i += 1;
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(StoreError::Syntax("unterminated string literal".into())),
                        // '' inside a literal is an escaped quote
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            s.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' | '!' | '<' | '>' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let (op, width) = match CmpOp::parse(&two) {
                    Some(op) if two.len() == 2 => (op, 2),
                    _ => match CmpOp::parse(&c.to_string()) {
                        Some(op) => (op, 1),
                        None => return Err(StoreError::Syntax(format!("unexpected '{}'", c))),
                    },
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(StoreError::Syntax(format!("unexpected '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.at_keyword(kw) {
            self.pos += 1;
            Ok(())
        } else {
            Err(StoreError::Syntax(format!(
                "expected {} but found {}",
                kw,
                describe(self.peek())
            )))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::Ident(s)) if !is_reserved(&s) => Ok(s),
            other => Err(StoreError::Syntax(format!(
                "expected identifier but found {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.bump() {
            Some(Token::Placeholder) => {
                let idx = self.params;
                self.params += 1;
                Ok(Operand::Param(idx))
            }
            Some(Token::Str(s)) => Ok(Operand::Literal(Scalar::Str(s))),
            Some(Token::Number(n)) => parse_number(&n).map(Operand::Literal),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("true") => {
                Ok(Operand::Literal(Scalar::Bool(true)))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("false") => {
                Ok(Operand::Literal(Scalar::Bool(false)))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("null") => {
                Ok(Operand::Literal(Scalar::Null))
            }
            other => Err(StoreError::Syntax(format!(
                "expected a value but found {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn select(&mut self) -> Result<Select> {
        self.expect_keyword("SELECT")?;

        let projection = if matches!(self.peek(), Some(Token::Star)) {
            self.pos += 1;
            Projection::All
        } else {
            let mut cols = vec![self.ident()?];
            while matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                cols.push(self.ident()?);
            }
            Projection::Columns(cols)
        };

        self.expect_keyword("FROM")?;
        let table = self.ident()?;

        let mut conditions = Vec::new();
        if self.at_keyword("WHERE") {
            self.pos += 1;
            loop {
                let column = self.ident()?;
                let op = match self.bump() {
                    Some(Token::Op(op)) => op,
                    other => {
                        return Err(StoreError::Syntax(format!(
                            "expected comparison operator but found {}",
                            describe(other.as_ref())
                        )))
                    }
                };
                let operand = self.operand()?;
                conditions.push(Condition {
                    column,
                    op,
                    operand,
                });
                if self.at_keyword("AND") {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }

        let mut limit = None;
        if self.at_keyword("LIMIT") {
            self.pos += 1;
            match self.bump() {
                Some(Token::Number(n)) => {
                    let v = n
                        .parse::<u64>()
                        .map_err(|_| StoreError::Syntax(format!("invalid LIMIT '{}'", n)))?;
                    limit = Some(v);
                }
                other => {
                    return Err(StoreError::Syntax(format!(
                        "expected LIMIT count but found {}",
                        describe(other.as_ref())
                    )))
                }
            }
        }

        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
        if let Some(extra) = self.peek() {
            return Err(StoreError::Syntax(format!(
                "unexpected trailing {}",
                describe(Some(extra))
            )));
        }

        Ok(Select {
            projection,
            table,
            conditions,
            limit,
        })
    }
}

fn is_reserved(word: &str) -> bool {
    ["select", "from", "where", "and", "limit"]
        .iter()
        .any(|kw| word.eq_ignore_ascii_case(kw))
}

fn describe(token: Option<&Token>) -> String {
    match token {
        None => "end of statement".to_string(),
        Some(Token::Ident(s)) => format!("'{}'", s),
        Some(Token::Number(n)) => n.clone(),
        Some(Token::Str(s)) => format!("'{}'", s),
        Some(Token::Star) => "'*'".to_string(),
        Some(Token::Comma) => "','".to_string(),
        Some(Token::Semicolon) => "';'".to_string(),
        Some(Token::Placeholder) => "'?'".to_string(),
        Some(Token::Op(op)) => format!("'{}'", op),
    }
}

fn parse_number(n: &str) -> Result<Scalar> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Scalar::I64(i));
    }
    n.parse::<f64>()
        .map(Scalar::F64)
        .map_err(|_| StoreError::Syntax(format!("invalid number '{}'", n)))
}

impl Select {
    pub fn parse(sql: &str) -> Result<Select> {
        let tokens = tokenize(sql)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            params: 0,
        };
        parser.select()
    }

    pub fn param_count(&self) -> usize {
        self.conditions
            .iter()
            .filter(|c| matches!(c.operand, Operand::Param(_)))
            .count()
    }

    /// Resolve columns against the table schema and substitute parameters.
    pub fn bind(&self, schema: &Arc<Schema>, params: &[Scalar]) -> Result<Plan> {
        let expected = self.param_count();
        if expected != params.len() {
            return Err(StoreError::ParamCount {
                expected,
                got: params.len(),
            });
        }

        let resolve = |col: &str| {
            schema
                .index_of(col)
                .ok_or_else(|| StoreError::UnknownColumn(col.to_string()))
        };

        let (output, projection) = match &self.projection {
            Projection::All => (Arc::clone(schema), (0..schema.len()).collect::<Vec<_>>()),
            Projection::Columns(cols) => {
                let indices = cols.iter().map(|c| resolve(c)).collect::<Result<Vec<_>>>()?;
                let fields = indices.iter().map(|&i| schema.fields[i].clone()).collect();
                (Arc::new(Schema::new(fields)), indices)
            }
        };

        let mut filters = Vec::with_capacity(self.conditions.len());
        for cond in &self.conditions {
            let idx = resolve(&cond.column)?;
            let value = match &cond.operand {
                Operand::Literal(v) => v.clone(),
                Operand::Param(p) => params[*p].clone(),
            };
            check_comparable(&schema.fields[idx].name, schema.fields[idx].data_type, cond.op, &value)?;
            filters.push((idx, cond.op, value));
        }

        let identity = projection.iter().copied().eq(0..schema.len());
        Ok(Plan {
            output,
            projection,
            identity,
            filters,
            limit: self.limit,
        })
    }
}

fn check_comparable(column: &str, column_type: DataType, op: CmpOp, value: &Scalar) -> Result<()> {
    let ok = match value.data_type() {
        None => true,
        Some(DataType::Boolean) => {
            column_type == DataType::Boolean && matches!(op, CmpOp::Eq | CmpOp::Ne)
        }
        Some(dt) if dt.is_numeric() => column_type.is_numeric(),
        Some(dt) => dt == column_type,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::TypeMismatch(format!(
            "cannot compare column '{}' ({:?}) {} {}",
            column, column_type, op, value
        )))
    }
}

/// A bound SELECT: which source columns to keep and which rows pass.
#[derive(Debug, Clone)]
pub struct Plan {
    output: Arc<Schema>,
    projection: Vec<usize>,
    identity: bool,
    filters: Vec<(usize, CmpOp, Scalar)>,
    limit: Option<u64>,
}

impl Plan {
    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Apply the WHERE clause and projection to one source record.
    ///
    /// `values` must be in source-table column order.
    pub fn apply(&self, values: Vec<Scalar>) -> Result<Option<Row>> {
        for (idx, op, rhs) in &self.filters {
            let lhs = values.get(*idx).ok_or_else(|| {
                StoreError::TypeMismatch(format!("record has no column #{}", idx))
            })?;
            if !compare(lhs, *op, rhs)? {
                return Ok(None);
            }
        }
        let values = if self.identity {
            values
        } else {
            self.projection
                .iter()
                .map(|&i| values.get(i).cloned().unwrap_or(Scalar::Null))
                .collect()
        };
        Ok(Some(Row::new(Arc::clone(&self.output), values)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Arc<Schema> {
        Arc::new(Schema::user_data())
    }

    #[test]
    fn test_parse_select_star() {
        let sel = Select::parse("SELECT * FROM user_data").unwrap();
        assert_eq!(sel.projection, Projection::All);
        assert_eq!(sel.table, "user_data");
        assert!(sel.conditions.is_empty());
        assert_eq!(sel.limit, None);
    }

    #[test]
    fn test_parse_where_and_limit_case_insensitive() {
        let sel =
            Select::parse("select name, age from user_data where age >= ? and name != 'O''Hara' limit 10;")
                .unwrap();
        assert_eq!(
            sel.projection,
            Projection::Columns(vec!["name".into(), "age".into()])
        );
        assert_eq!(sel.conditions.len(), 2);
        assert_eq!(sel.conditions[0].op, CmpOp::Ge);
        assert_eq!(sel.conditions[0].operand, Operand::Param(0));
        assert_eq!(
            sel.conditions[1].operand,
            Operand::Literal(Scalar::Str("O'Hara".into()))
        );
        assert_eq!(sel.limit, Some(10));
        assert_eq!(sel.param_count(), 1);
    }

    #[test]
    fn test_malformed_statements_are_syntax_errors() {
        for sql in [
            "",
            "SELECT FROM user_data",
            "SELECT * user_data",
            "SELECT * FROM user_data WHERE age",
            "SELECT * FROM user_data LIMIT x",
            "SELECT * FROM user_data extra",
            "SELECT * FROM user_data WHERE name = 'open",
        ] {
            assert!(
                matches!(Select::parse(sql), Err(StoreError::Syntax(_))),
                "{sql} should not parse"
            );
        }
    }

    #[test]
    fn test_bind_checks_params_and_columns() {
        let sel = Select::parse("SELECT * FROM user_data WHERE age > ?").unwrap();
        assert!(matches!(
            sel.bind(&users(), &[]),
            Err(StoreError::ParamCount { expected: 1, got: 0 })
        ));

        let sel = Select::parse("SELECT height FROM user_data").unwrap();
        assert!(matches!(
            sel.bind(&users(), &[]),
            Err(StoreError::UnknownColumn(c)) if c == "height"
        ));

        let sel = Select::parse("SELECT * FROM user_data WHERE age > 'old'").unwrap();
        assert!(matches!(
            sel.bind(&users(), &[]),
            Err(StoreError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_plan_filters_and_projects() {
        let schema = users();
        let plan = Select::parse("SELECT age FROM user_data WHERE age > ?")
            .unwrap()
            .bind(&schema, &[Scalar::I64(30)])
            .unwrap();

        let young = vec!["id".into(), "Ann".into(), "a@x".into(), Scalar::I64(22)];
        let old = vec!["id".into(), "Bo".into(), "b@x".into(), Scalar::I64(41)];

        assert!(plan.apply(young).unwrap().is_none());
        let row = plan.apply(old).unwrap().unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("age"), Some(&Scalar::I64(41)));
    }
}
