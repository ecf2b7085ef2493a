//! Error types for the row store and its indexes.

use thiserror::Error;

use crate::data_type::DataType;
use crate::row::RowId;

/// Result type alias using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Broad classification of a [StoreError], for callers that only need to
/// know which layer should react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A row was rejected before any index was touched.
    Validation,
    /// A unique index would gain a second row id under one key.
    Uniqueness,
    /// A table, column or index definition is invalid.
    Configuration,
    /// A replayed row id is already in use.
    Conflict,
}

/// Errors that can occur in row store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    // Validation errors
    #[error("Table {table}: expected {expected} values, got {actual}")]
    ArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Table {table}: column {column} does not accept NULL")]
    NullViolation { table: String, column: String },

    #[error("Table {table}: column {column} expects {expected}, got {actual}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: DataType,
        actual: DataType,
    },

    // Uniqueness errors
    #[error("Unique index {index} already holds key {key}")]
    UniqueViolation { index: String, key: String },

    // Configuration errors
    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("Duplicate column {column} in table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index {0} must cover at least one column")]
    EmptyIndexColumns(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidConfig {
        name: String,
        value: String,
        reason: String,
    },

    // Row-id replay errors
    #[error("Table {table}: row id {id} is already in use")]
    DuplicateRowId { table: String, id: RowId },

    #[error("Table {table}: row ids are exhausted")]
    RowIdExhausted { table: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArityMismatch { .. } | Self::NullViolation { .. } | Self::TypeMismatch { .. } => {
                ErrorKind::Validation
            }
            Self::UniqueViolation { .. } => ErrorKind::Uniqueness,
            Self::DuplicateRowId { .. } | Self::RowIdExhausted { .. } => ErrorKind::Conflict,
            Self::TableAlreadyExists(_)
            | Self::TableNotFound(_)
            | Self::ColumnNotFound { .. }
            | Self::DuplicateColumn { .. }
            | Self::IndexAlreadyExists(_)
            | Self::IndexNotFound(_)
            | Self::EmptyIndexColumns(_)
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` for row validation failures (arity, nullability, type).
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_unique_violation(&self) -> bool {
        self.kind() == ErrorKind::Uniqueness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NullViolation {
            table: "t".into(),
            column: "id".into(),
        };
        assert_eq!(err.to_string(), "Table t: column id does not accept NULL");

        let err = StoreError::TypeMismatch {
            table: "t".into(),
            column: "id".into(),
            expected: DataType::Int,
            actual: DataType::Text,
        };
        assert_eq!(err.to_string(), "Table t: column id expects INT, got TEXT");
    }

    #[test]
    fn test_error_kind() {
        let unique = StoreError::UniqueViolation {
            index: "ux".into(),
            key: "(1)".into(),
        };
        assert_eq!(unique.kind(), ErrorKind::Uniqueness);
        assert!(unique.is_unique_violation());
        assert!(!unique.is_validation());

        let arity = StoreError::ArityMismatch {
            table: "t".into(),
            expected: 2,
            actual: 1,
        };
        assert!(arity.is_validation());
        assert_eq!(
            StoreError::IndexAlreadyExists("i".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            StoreError::DuplicateRowId {
                table: "t".into(),
                id: 3
            }
            .kind(),
            ErrorKind::Conflict
        );
    }
}
