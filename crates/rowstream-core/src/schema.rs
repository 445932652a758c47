//! Logical schema types. Pure data; drivers map their native column types
//! onto `DataType`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The one table the pipeline reads.
pub const USER_DATA_TABLE: &str = "user_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// `user_data(user_id, name, email, age)`.
    pub fn user_data() -> Self {
        Self::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("email", DataType::Utf8, false),
            Field::new("age", DataType::Int64, false),
        ])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Narrow the schema to `columns` (in the given order).
    ///
    /// Returns the projected schema plus, for each output column, its index in
    /// `self`.
    pub fn project(&self, columns: &[String]) -> Result<(Schema, Vec<usize>)> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut indices = Vec::with_capacity(columns.len());
        for col in columns {
            let idx = self
                .index_of(col)
                .ok_or_else(|| Error::Schema(format!("column '{}' not found", col)))?;
            fields.push(self.fields[idx].clone());
            indices.push(idx);
        }
        Ok((Schema::new(fields), indices))
    }
}
