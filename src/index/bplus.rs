use parking_lot::RwLock;

use super::{IndexKind, RowIdSet, TableIndex};
use crate::btree::BPlusTree;
use crate::config::BPlusTreeConfig;
use crate::error::Result;
use crate::row::{Row, RowId};
use crate::value::Value;

/// Single-column index backed by a [BPlusTree].
///
/// Same contract as [OrderedIndex](super::OrderedIndex): null and
/// non-orderable values are skipped.
#[derive(Debug)]
pub struct BPlusTreeIndex {
    name: String,
    columns: Vec<String>,
    position: usize,
    tree: RwLock<BPlusTree<Value, RowId>>,
}

impl BPlusTreeIndex {
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        position: usize,
        config: BPlusTreeConfig,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            columns: vec![column.into()],
            position,
            tree: RwLock::new(BPlusTree::new(config)?),
        })
    }

    fn key_of<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get(self.position).filter(|v| v.is_orderable())
    }

    pub fn find_equal(&self, value: &Value) -> RowIdSet {
        self.tree.read().find(value).cloned().unwrap_or_default()
    }

    pub fn find_range(&self, min: &Value, max: &Value) -> RowIdSet {
        self.tree.read().find_range(min, max)
    }

    pub fn find_less_than(&self, value: &Value) -> RowIdSet {
        self.tree.read().find_less_than(value)
    }

    pub fn find_greater_than(&self, value: &Value) -> RowIdSet {
        self.tree.read().find_greater_than(value)
    }

    pub fn height(&self) -> usize {
        self.tree.read().height()
    }

    pub fn config(&self) -> BPlusTreeConfig {
        self.tree.read().config()
    }

    /// See [BPlusTree::check_invariants].
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.tree.read().check_invariants()
    }
}

impl TableIndex for BPlusTreeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::BPlusTree
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn insert(&self, row: &Row) -> Result<()> {
        if let Some(key) = self.key_of(row) {
            self.tree.write().insert(key.clone(), row.id());
        }
        Ok(())
    }

    fn delete(&self, row: &Row) {
        if let Some(key) = self.key_of(row) {
            self.tree.write().remove(key, &row.id());
        }
    }

    fn update(&self, old: &Row, new: &Row) -> Result<()> {
        let mut tree = self.tree.write();
        if let Some(key) = self.key_of(old) {
            tree.remove(key, &old.id());
        }
        if let Some(key) = self.key_of(new) {
            tree.insert(key.clone(), new.id());
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
        self.tree.read().len()
    }

    fn entry_count(&self) -> usize {
        self.tree.read().total_values()
    }

    fn clear(&self) {
        self.tree.write().clear();
    }
}
