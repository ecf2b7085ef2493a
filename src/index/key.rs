use std::cmp::Ordering;
use std::fmt;

use crate::row::Row;
use crate::value::Value;

/// Ordered tuple of column values used as one index key.
///
/// Components compare pairwise in column order using the [Value] total
/// order; when every compared component is equal the shorter key sorts first. All keys sharing a prefix
/// are therefore contiguous and the bare prefix sorts before all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(pub Vec<Value>);

impl CompositeKey {
    /// Builds the key of `row` over the columns at `positions`.
    ///
    /// Returns `None` if any component is `NULL` or out of bounds: rows with
    /// a partially null key are not indexed at all.
    pub fn from_row(row: &Row, positions: &[usize]) -> Option<Self> {
        positions
            .iter()
            .map(|&pos| row.get(pos).filter(|v| !v.is_null()).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Builds a probe key from caller-supplied values, rejecting `NULL`.
    pub fn from_values(values: &[Value]) -> Option<Self> {
        if values.iter().any(Value::is_null) {
            return None;
        }
        Some(Self(values.to_vec()))
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the leading components equal `prefix`.
    pub fn starts_with(&self, prefix: &[Value]) -> bool {
        self.0.len() >= prefix.len()
            && self
                .0
                .iter()
                .zip(prefix)
                .all(|(a, b)| a == b)
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}
