use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use tracing::warn;

use super::key::CompositeKey;
use super::{IndexKind, RowIdSet, TableIndex};
use crate::error::{Result, StoreError};
use crate::row::{Row, RowId};
use crate::value::Value;

/// Composite key -> row ids map shared by [CompositeIndex] and
/// [PartialIndex](super::PartialIndex). It is not synchronized; callers hold
/// their own lock around it for the whole of each operation.
#[derive(Debug, Default)]
pub(crate) struct KeyMap {
    unique: bool,
    entries: BTreeMap<CompositeKey, RowIdSet>,
}

impl KeyMap {
    pub(crate) fn new(unique: bool) -> Self {
        Self {
            unique,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn is_unique(&self) -> bool {
        self.unique
    }

    /// Fails if adding `id` under `key` would give a unique key a second row.
    /// `released` names a row id that is about to leave `key` and therefore
    /// does not count as a holder.
    pub(crate) fn check(
        &self,
        index: &str,
        key: &CompositeKey,
        id: RowId,
        released: Option<RowId>,
    ) -> Result<()> {
        if !self.unique {
            return Ok(());
        }
        let taken = self
            .entries
            .get(key)
            .is_some_and(|ids| ids.iter().any(|&held| held != id && Some(held) != released));
        if taken {
            warn!(index, %key, row_id = id, "unique index violation");
            return Err(StoreError::UniqueViolation {
                index: index.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn add(&mut self, index: &str, key: CompositeKey, id: RowId) -> Result<()> {
        self.check(index, &key, id, None)?;
        self.entries.entry(key).or_default().insert(id);
        Ok(())
    }

    /// Removes `id` from under `key`. Returns `true` if it was present.
    pub(crate) fn remove(&mut self, key: &CompositeKey, id: RowId) -> bool {
        let Some(ids) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    /// Moves a row from `old` to `new`. If the new key is rejected, the old
    /// entry is put back before the error is returned.
    pub(crate) fn replace(
        &mut self,
        index: &str,
        old: Option<(CompositeKey, RowId)>,
        new: Option<(CompositeKey, RowId)>,
    ) -> Result<()> {
        let removed = match &old {
            Some((key, id)) => self.remove(key, *id),
            None => false,
        };
        let Some((key, id)) = new else {
            return Ok(());
        };
        if let Err(err) = self.add(index, key, id) {
            if let (true, Some((key, id))) = (removed, old) {
                self.entries.entry(key).or_default().insert(id);
            }
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn check_replace(
        &self,
        index: &str,
        old: Option<(&CompositeKey, RowId)>,
        new: Option<(&CompositeKey, RowId)>,
    ) -> Result<()> {
        let Some((new_key, new_id)) = new else {
            return Ok(());
        };
        let released = old.filter(|(key, _)| *key == new_key).map(|(_, id)| id);
        self.check(index, new_key, new_id, released)
    }

    pub(crate) fn exact(&self, key: &CompositeKey) -> RowIdSet {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Row ids under every key whose leading components equal `prefix`.
    pub(crate) fn prefix(&self, prefix: &[Value]) -> RowIdSet {
        let start = CompositeKey(prefix.to_vec());
        self.entries
            .range(start..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Row ids under every key in `[min, max]`, compared as composite keys.
    pub(crate) fn range(&self, min: &CompositeKey, max: &CompositeKey) -> RowIdSet {
        if min > max {
            return RowIdSet::new();
        }
        self.entries
            .range::<CompositeKey, _>((Bound::Included(min), Bound::Included(max)))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub(crate) fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.values().map(RowIdSet::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Multi-column ordered index, optionally enforcing key uniqueness.
///
/// Rows with a `NULL` in any indexed column are left out entirely.
#[derive(Debug)]
pub struct CompositeIndex {
    name: String,
    columns: Vec<String>,
    positions: Vec<usize>,
    entries: RwLock<KeyMap>,
}

impl CompositeIndex {
    /// Creates an empty index. `columns` and `positions` are parallel and in
    /// key order.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        positions: Vec<usize>,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            positions,
            entries: RwLock::new(KeyMap::new(unique)),
        }
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    fn key_of(&self, row: &Row) -> Option<(CompositeKey, RowId)> {
        CompositeKey::from_row(row, &self.positions).map(|key| (key, row.id()))
    }

    /// Rows whose key equals `values` exactly.
    pub fn find_exact(&self, values: &[Value]) -> RowIdSet {
        match CompositeKey::from_values(values) {
            Some(key) if key.len() == self.positions.len() => self.entries.read().exact(&key),
            _ => RowIdSet::new(),
        }
    }

    /// Rows whose key starts with `prefix`. An empty prefix matches every row.
    pub fn find_prefix(&self, prefix: &[Value]) -> RowIdSet {
        if prefix.len() > self.positions.len() || prefix.iter().any(Value::is_null) {
            return RowIdSet::new();
        }
        self.entries.read().prefix(prefix)
    }

    /// Rows whose key lies in `[min, max]` under composite-key ordering.
    /// Bounds may be shorter than the key; a short bound sorts before every
    /// key it prefixes.
    pub fn find_range(&self, min: &[Value], max: &[Value]) -> RowIdSet {
        match (CompositeKey::from_values(min), CompositeKey::from_values(max)) {
            (Some(min), Some(max)) => self.entries.read().range(&min, &max),
            _ => RowIdSet::new(),
        }
    }
}

impl TableIndex for CompositeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Composite
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn is_unique(&self) -> bool {
        self.entries.read().is_unique()
    }

    fn check_insert(&self, row: &Row) -> Result<()> {
        match self.key_of(row) {
            Some((key, id)) => self.entries.read().check(&self.name, &key, id, None),
            None => Ok(()),
        }
    }

    fn check_update(&self, old: &Row, new: &Row) -> Result<()> {
        let old = self.key_of(old);
        let new = self.key_of(new);
        self.entries.read().check_replace(
            &self.name,
            old.as_ref().map(|(k, id)| (k, *id)),
            new.as_ref().map(|(k, id)| (k, *id)),
        )
    }

    fn insert(&self, row: &Row) -> Result<()> {
        match self.key_of(row) {
            Some((key, id)) => self.entries.write().add(&self.name, key, id),
            None => Ok(()),
        }
    }

    fn delete(&self, row: &Row) {
        if let Some((key, id)) = self.key_of(row) {
            self.entries.write().remove(&key, id);
        }
    }

    fn update(&self, old: &Row, new: &Row) -> Result<()> {
        self.entries
            .write()
            .replace(&self.name, self.key_of(old), self.key_of(new))
    }

    fn find_exact(&self, key: &[Value]) -> RowIdSet {
        CompositeIndex::find_exact(self, key)
    }

    fn key_count(&self) -> usize {
        self.entries.read().key_count()
    }

    fn entry_count(&self) -> usize {
        self.entries.read().entry_count()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::*;

    fn index(unique: bool) -> CompositeIndex {
        CompositeIndex::new(
            "idx_abc",
            vec!["a".into(), "b".into(), "c".into()],
            vec![0, 1, 2],
            unique,
        )
    }

    fn row(id: RowId, a: i64, b: i64, c: i64) -> Row {
        Row::new(id, vec![Value::Int(a), Value::Int(b), Value::Int(c)])
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_find_exact() {
        let idx = index(false);
        idx.insert(&row(1, 1, 2, 3)).unwrap();
        idx.insert(&row(2, 1, 2, 3)).unwrap();
        idx.insert(&row(3, 1, 2, 4)).unwrap();

        assert_eq!(idx.find_exact(&ints(&[1, 2, 3])), RowIdSet::from([1, 2]));
        assert_eq!(idx.find_exact(&ints(&[1, 2, 4])), RowIdSet::from([3]));
        assert!(idx.find_exact(&ints(&[1, 2])).is_empty());
        assert_eq!(idx.key_count(), 2);
        assert_eq!(idx.entry_count(), 3);
    }

    #[test]
    fn test_rows_with_any_null_component_are_excluded() {
        let idx = index(false);
        idx.insert(&Row::new(
            1,
            vec![Value::Int(1), Value::Null, Value::Int(3)],
        ))
        .unwrap();

        assert_eq!(idx.key_count(), 0);
        assert!(idx.find_prefix(&ints(&[1])).is_empty());
        assert!(idx.find_exact(&[Value::Int(1), Value::Null, Value::Int(3)]).is_empty());
    }

    #[test]
    fn test_find_prefix() {
        let idx = index(false);
        idx.insert(&row(1, 1, 2, 3)).unwrap();
        idx.insert(&row(2, 1, 2, 9)).unwrap();
        idx.insert(&row(3, 1, 3, 0)).unwrap();
        idx.insert(&row(4, 0, 2, 3)).unwrap();
        idx.insert(&row(5, 2, 2, 3)).unwrap();

        assert_eq!(idx.find_prefix(&ints(&[1, 2])), RowIdSet::from([1, 2]));
        assert_eq!(idx.find_prefix(&ints(&[1])), RowIdSet::from([1, 2, 3]));
        assert_eq!(idx.find_prefix(&[]), RowIdSet::from([1, 2, 3, 4, 5]));
        assert!(idx.find_prefix(&ints(&[1, 2, 3, 4])).is_empty());
    }

    #[test]
    fn test_find_range() {
        let idx = index(false);
        for (id, a) in (1..=5).zip(10..) {
            idx.insert(&row(id, a, 0, 0)).unwrap();
        }

        assert_eq!(
            idx.find_range(&ints(&[11]), &ints(&[13, 0, 0])),
            RowIdSet::from([2, 3, 4])
        );
        assert!(idx.find_range(&ints(&[13]), &ints(&[11])).is_empty());
    }

    #[test]
    fn test_unique_violation_keeps_first_row() {
        let idx = index(true);
        idx.insert(&row(1, 1, 1, 1)).unwrap();

        assert!(idx.check_insert(&row(2, 1, 1, 1)).is_err());
        let err = idx.insert(&row(2, 1, 1, 1)).unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueViolation {
                index: "idx_abc".into(),
                key: "(1, 1, 1)".into(),
            }
        );
        assert_eq!(idx.find_exact(&ints(&[1, 1, 1])), RowIdSet::from([1]));
        assert!(idx.is_unique());
    }

    #[test]
    fn test_unique_allows_null_keys_repeatedly() {
        let idx = index(true);
        let with_null = |id| Row::new(id, vec![Value::Int(1), Value::Null, Value::Int(1)]);
        idx.insert(&with_null(1)).unwrap();
        idx.insert(&with_null(2)).unwrap();
        assert_eq!(idx.entry_count(), 0);
    }

    #[test]
    fn test_update_moves_key() {
        let idx = index(true);
        idx.insert(&row(1, 1, 1, 1)).unwrap();
        idx.update(&row(1, 1, 1, 1), &row(1, 2, 2, 2)).unwrap();

        assert!(idx.find_exact(&ints(&[1, 1, 1])).is_empty());
        assert_eq!(idx.find_exact(&ints(&[2, 2, 2])), RowIdSet::from([1]));
    }

    #[test]
    fn test_update_to_same_key_on_unique_index() {
        let idx = index(true);
        idx.insert(&row(1, 1, 1, 1)).unwrap();
        idx.check_update(&row(1, 1, 1, 1), &row(1, 1, 1, 1)).unwrap();
        idx.update(&row(1, 1, 1, 1), &row(1, 1, 1, 1)).unwrap();
        assert_eq!(idx.find_exact(&ints(&[1, 1, 1])), RowIdSet::from([1]));
    }

    #[test]
    fn test_rejected_update_restores_old_entry() {
        let idx = index(true);
        idx.insert(&row(1, 1, 1, 1)).unwrap();
        idx.insert(&row(2, 2, 2, 2)).unwrap();

        assert!(idx.check_update(&row(2, 2, 2, 2), &row(2, 1, 1, 1)).is_err());
        let err = idx.update(&row(2, 2, 2, 2), &row(2, 1, 1, 1)).unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(idx.find_exact(&ints(&[1, 1, 1])), RowIdSet::from([1]));
        assert_eq!(idx.find_exact(&ints(&[2, 2, 2])), RowIdSet::from([2]));
        assert_eq!(idx.entry_count(), 2);
    }

    #[test]
    fn test_update_into_and_out_of_null() {
        let idx = index(false);
        let null_row = Row::new(1, vec![Value::Int(1), Value::Null, Value::Int(1)]);
        idx.insert(&null_row).unwrap();
        idx.update(&null_row, &row(1, 1, 1, 1)).unwrap();
        assert_eq!(idx.find_exact(&ints(&[1, 1, 1])), RowIdSet::from([1]));
        idx.update(&row(1, 1, 1, 1), &null_row).unwrap();
        assert_eq!(idx.key_count(), 0);
    }

    proptest! {
        #[test]
        fn prefix_matches_filter(
            keys in vec((0i64..4, 0i64..4, 0i64..4), 0..60),
            a in 0i64..4,
            b in 0i64..4,
        ) {
            let idx = index(false);
            for (id, (x, y, z)) in keys.iter().enumerate() {
                idx.insert(&row(id as RowId, *x, *y, *z)).unwrap();
            }

            let expected: RowIdSet = keys
                .iter()
                .enumerate()
                .filter(|(_, (x, y, _))| *x == a && *y == b)
                .map(|(id, _)| id as RowId)
                .collect();
            prop_assert_eq!(idx.find_prefix(&ints(&[a, b])), expected);
        }
    }
}
