use std::fmt;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Represents the supported data types in the table schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Allocative, Serialize, Deserialize)]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit floating-point number.
    Float,
    /// A variable-length UTF-8 character string.
    Text,
    /// A boolean value (true or false).
    Bool,
    /// An opaque byte string. Storable, but has no natural ordering.
    Bytes,
}

impl DataType {
    /// Returns `true` if `value` may be stored in a column of this type.
    ///
    /// `NULL` is a member of every type; nullability is a column property and
    /// is checked separately.
    pub fn accepts(self, value: &Value) -> bool {
        value.data_type().is_none_or(|t| t == self)
    }

    /// Returns `true` if values of this type have a natural ordering and can
    /// therefore be keys of a single-column ordered index.
    pub fn is_orderable(self) -> bool {
        !matches!(self, Self::Bytes)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Bool => "BOOL",
            Self::Bytes => "BYTES",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_matching_type_and_null() {
        assert!(DataType::Int.accepts(&Value::Int(3)));
        assert!(DataType::Int.accepts(&Value::Null));
        assert!(!DataType::Int.accepts(&Value::Float(3.0)));
        assert!(!DataType::Text.accepts(&Value::Int(3)));
        assert!(DataType::Bytes.accepts(&Value::Bytes(vec![1u8, 2].into())));
    }

    #[test]
    fn test_orderable() {
        assert!(DataType::Int.is_orderable());
        assert!(DataType::Text.is_orderable());
        assert!(!DataType::Bytes.is_orderable());
    }
}
