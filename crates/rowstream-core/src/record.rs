//! Typed view of a `user_data` row.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::{Row, Scalar};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub age: i64,
}

impl UserRecord {
    pub fn new(user_id: Uuid, name: impl Into<String>, email: impl Into<String>, age: i64) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: email.into(),
            age,
        }
    }

    /// Values in `Schema::user_data()` column order.
    pub fn to_values(&self) -> Vec<Scalar> {
        vec![
            Scalar::Str(self.user_id.to_string()),
            Scalar::Str(self.name.clone()),
            Scalar::Str(self.email.clone()),
            Scalar::I64(self.age),
        ]
    }

    pub fn to_row(&self, schema: Arc<Schema>) -> Result<Row> {
        Row::new(schema, self.to_values())
    }
}

impl TryFrom<&Row> for UserRecord {
    type Error = Error;

    fn try_from(row: &Row) -> Result<Self> {
        let text = |col: &str| -> Result<String> {
            row.get(col)
                .and_then(Scalar::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Schema(format!("user row lacks text column '{}'", col)))
        };
        let raw_id = text("user_id")?;
        let user_id = Uuid::parse_str(&raw_id)
            .map_err(|e| Error::Schema(format!("invalid user_id '{}': {}", raw_id, e)))?;
        let age = row
            .get("age")
            .and_then(Scalar::as_i64)
            .ok_or_else(|| Error::Schema("user row lacks integer column 'age'".into()))?;
        Ok(Self {
            user_id,
            name: text("name")?,
            email: text("email")?,
            age,
        })
    }
}
