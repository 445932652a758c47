//! The statement a stream executes when it opens.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{hash_serde, Hash256};
use crate::types::Scalar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Scalar>,
}

impl QuerySpec {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Scalar>) -> Self {
        self.params = params;
        self
    }

    /// `SELECT * FROM <table>`.
    pub fn select_all(table: &str) -> Self {
        Self::new(format!("SELECT * FROM {}", table))
    }

    /// Cache key covering the target DSN, the statement text and its parameters.
    pub fn cache_key(&self, dsn: &str) -> Result<Hash256> {
        hash_serde(&(dsn, &self.sql, &self.params))
    }
}
