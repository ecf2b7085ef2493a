use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{Result, StoreError};
use crate::value::Value;

/// Column definition of a table.
///
/// Columns are fixed when the table is created; their position in the
/// table's column list is the position of their value in every [Row](crate::Row).
#[derive(Debug, Clone, PartialEq, Eq, Allocative, Serialize, Deserialize)]
pub struct Column {
    /// The name of the column.
    pub name: String,
    /// The logical data type of the column.
    pub data_type: DataType,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Shorthand for a `NULL`-accepting column.
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, true)
    }

    /// Shorthand for a `NOT NULL` column.
    pub fn not_null(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, false)
    }

    /// Checks that `value` can be stored in this column.
    ///
    /// # Errors
    /// - [StoreError::NullViolation] if the value is `NULL` and the column is `NOT NULL`.
    /// - [StoreError::TypeMismatch] if the value's type differs from the column type.
    pub fn validate(&self, table: &str, value: &Value) -> Result<()> {
        match value.data_type() {
            None if !self.nullable => Err(StoreError::NullViolation {
                table: table.to_string(),
                column: self.name.clone(),
            }),
            None => Ok(()),
            Some(actual) if actual != self.data_type => Err(StoreError::TypeMismatch {
                table: table.to_string(),
                column: self.name.clone(),
                expected: self.data_type,
                actual,
            }),
            Some(_) => Ok(()),
        }
    }
}
