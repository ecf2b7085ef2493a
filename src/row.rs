use allocative::Allocative;

use crate::value::Value;

/// Stable, per-table-unique row identifier.
pub type RowId = i64;

/// A stored row: its id plus one value per table column, in column order.
///
/// Rows are replaced wholesale on update, never mutated in place, so a
/// `Row` handed out by a [Table](crate::Table) is an independent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct Row {
    id: RowId,
    data: Vec<Value>,
}

impl Row {
    pub fn new(id: RowId, data: Vec<Value>) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    /// The row's values, positionally matching the table columns.
    pub fn values(&self) -> &[Value] {
        &self.data
    }

    /// Value at column position `pos`, `None` when out of bounds.
    pub fn get(&self, pos: usize) -> Option<&Value> {
        self.data.get(pos)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new(7, vec![Value::Int(1), Value::Null]);
        assert_eq!(row.id(), 7);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row.get(1), Some(&Value::Null));
        assert_eq!(row.get(2), None);
        assert_eq!(row.into_values(), vec![Value::Int(1), Value::Null]);
    }
}
