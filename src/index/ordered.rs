use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{IndexKind, RowIdSet, TableIndex};
use crate::error::Result;
use crate::row::{Row, RowId};
use crate::value::Value;

/// Single-column ordered index: column value -> ids of the rows holding it.
///
/// Null and non-orderable values are never indexed, so a value is a key iff
/// at least one row holds it and the key is pruned when its last row leaves.
#[derive(Debug)]
pub struct OrderedIndex {
    name: String,
    columns: Vec<String>,
    position: usize,
    entries: RwLock<BTreeMap<Value, RowIdSet>>,
}

impl OrderedIndex {
    /// Creates an empty index over the column at `position`.
    pub fn new(name: impl Into<String>, column: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            position,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn key_of<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get(self.position).filter(|v| v.is_orderable())
    }

    fn add(entries: &mut BTreeMap<Value, RowIdSet>, key: &Value, id: RowId) {
        entries.entry(key.clone()).or_default().insert(id);
    }

    fn remove(entries: &mut BTreeMap<Value, RowIdSet>, key: &Value, id: RowId) {
        if let Some(ids) = entries.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                entries.remove(key);
            }
        }
    }

    fn collect<'a>(ids: impl Iterator<Item = &'a RowIdSet>) -> RowIdSet {
        ids.flat_map(|set| set.iter().copied()).collect()
    }

    /// Rows whose indexed value equals `value`. Always empty for `NULL`.
    pub fn find_equal(&self, value: &Value) -> RowIdSet {
        self.entries.read().get(value).cloned().unwrap_or_default()
    }

    /// Rows whose indexed value lies in `[min, max]`.
    pub fn find_range(&self, min: &Value, max: &Value) -> RowIdSet {
        if min > max {
            return RowIdSet::new();
        }
        Self::collect(self.entries.read().range::<Value, _>(min..=max).map(|(_, ids)| ids))
    }

    /// Rows whose indexed value is strictly below `value`.
    pub fn find_less_than(&self, value: &Value) -> RowIdSet {
        Self::collect(self.entries.read().range::<Value, _>(..value).map(|(_, ids)| ids))
    }

    /// Rows whose indexed value is strictly above `value`.
    pub fn find_greater_than(&self, value: &Value) -> RowIdSet {
        let range = (Bound::Excluded(value), Bound::Unbounded);
        Self::collect(self.entries.read().range::<Value, _>(range).map(|(_, ids)| ids))
    }

    /// Distinct indexed values in ascending order.
    pub fn keys(&self) -> Vec<Value> {
        self.entries.read().keys().cloned().collect()
    }
}

impl TableIndex for OrderedIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Ordered
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn insert(&self, row: &Row) -> Result<()> {
        if let Some(key) = self.key_of(row) {
            Self::add(&mut self.entries.write(), key, row.id());
        }
        Ok(())
    }

    fn delete(&self, row: &Row) {
        if let Some(key) = self.key_of(row) {
            Self::remove(&mut self.entries.write(), key, row.id());
        }
    }

    fn update(&self, old: &Row, new: &Row) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(key) = self.key_of(old) {
            Self::remove(&mut entries, key, old.id());
        }
        if let Some(key) = self.key_of(new) {
            Self::add(&mut entries, key, new.id());
        }
        Ok(())
    }

    fn find_exact(&self, key: &[Value]) -> RowIdSet {
        match key {
            [value] => self.find_equal(value),
            _ => RowIdSet::new(),
        }
    }

    fn key_count(&self) -> usize {
        self.entries.read().len()
    }

    fn entry_count(&self) -> usize {
        self.entries.read().values().map(RowIdSet::len).sum()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: RowId, value: Value) -> Row {
        Row::new(id, vec![Value::Int(id), value])
    }

    fn index_with(values: &[(RowId, Value)]) -> OrderedIndex {
        let index = OrderedIndex::new("idx_score", "score", 1);
        for (id, value) in values {
            index.insert(&row(*id, value.clone())).unwrap();
        }
        index
    }

    #[test]
    fn test_insert_and_find_equal() {
        let index = index_with(&[
            (1, Value::Int(10)),
            (2, Value::Int(20)),
            (3, Value::Int(10)),
        ]);

        assert_eq!(index.find_equal(&Value::Int(10)), RowIdSet::from([1, 3]));
        assert_eq!(index.find_equal(&Value::Int(20)), RowIdSet::from([2]));
        assert!(index.find_equal(&Value::Int(30)).is_empty());
        assert_eq!(index.key_count(), 2);
        assert_eq!(index.entry_count(), 3);
    }

    #[test]
    fn test_null_and_unorderable_are_skipped() {
        let index = index_with(&[
            (1, Value::Null),
            (2, Value::Bytes(vec![1u8].into())),
            (3, Value::Int(5)),
        ]);

        assert_eq!(index.key_count(), 1);
        assert!(index.find_equal(&Value::Null).is_empty());
        index.delete(&row(1, Value::Null));
        assert_eq!(index.entry_count(), 1);
    }

    #[test]
    fn test_range_queries() {
        let index = index_with(&(1..=10).map(|i| (i, Value::Int(i * 10))).collect::<Vec<_>>());

        assert_eq!(
            index.find_range(&Value::Int(20), &Value::Int(40)),
            RowIdSet::from([2, 3, 4])
        );
        assert_eq!(
            index.find_range(&Value::Int(25), &Value::Int(25)),
            RowIdSet::new()
        );
        assert!(index.find_range(&Value::Int(40), &Value::Int(20)).is_empty());
        assert_eq!(
            index.find_less_than(&Value::Int(30)),
            RowIdSet::from([1, 2])
        );
        assert_eq!(
            index.find_greater_than(&Value::Int(80)),
            RowIdSet::from([9, 10])
        );
    }

    #[test]
    fn test_delete_prunes_empty_keys() {
        let index = index_with(&[(1, Value::Int(7)), (2, Value::Int(7))]);

        index.delete(&row(1, Value::Int(7)));
        assert_eq!(index.find_equal(&Value::Int(7)), RowIdSet::from([2]));
        index.delete(&row(2, Value::Int(7)));
        assert_eq!(index.key_count(), 0);
        assert!(index.keys().is_empty());
    }

    #[test]
    fn test_update_moves_row() {
        let index = index_with(&[(1, Value::Int(7))]);

        index
            .update(&row(1, Value::Int(7)), &row(1, Value::Int(8)))
            .unwrap();
        assert!(index.find_equal(&Value::Int(7)).is_empty());
        assert_eq!(index.find_exact(&[Value::Int(8)]), RowIdSet::from([1]));

        index.update(&row(1, Value::Int(8)), &row(1, Value::Null)).unwrap();
        assert_eq!(index.key_count(), 0);
    }

    #[test]
    fn test_find_exact_wrong_arity() {
        let index = index_with(&[(1, Value::Int(7))]);
        assert!(index.find_exact(&[]).is_empty());
        assert!(index.find_exact(&[Value::Int(7), Value::Int(7)]).is_empty());
    }
}
