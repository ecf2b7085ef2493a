use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::composite::KeyMap;
use super::key::CompositeKey;
use super::{IndexKind, RowIdSet, TableIndex};
use crate::column::Column;
use crate::error::Result;
use crate::row::{Row, RowId};
use crate::value::Value;

/// A row bound to its table's columns, so predicates can look values up by name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [Column],
    row: &'a Row,
}

impl<'a> RowView<'a> {
    pub fn new(columns: &'a [Column], row: &'a Row) -> Self {
        Self { columns, row }
    }

    /// Value of the column called `name`, `None` if there is no such column.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        self.row.get(pos)
    }

    pub fn row(&self) -> &'a Row {
        self.row
    }
}

type PredicateFn = dyn Fn(&RowView<'_>) -> bool + Send + Sync;

/// Row filter of a [PartialIndex], supplied by the caller's expression
/// evaluator. The description is the filter's source text, kept for
/// display and planning.
#[derive(Clone)]
pub struct Predicate {
    description: Arc<str>,
    eval: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new(
        description: impl AsRef<str>,
        eval: impl Fn(&RowView<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.as_ref().into(),
            eval: Arc::new(eval),
        }
    }

    /// Admits every row.
    pub fn always() -> Self {
        Self::new("TRUE", |_| true)
    }

    /// `column IS NOT NULL`. False when the column does not exist.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        let column = column.into();
        Self::new(format!("{column} IS NOT NULL"), move |row| {
            row.get(&column).is_some_and(|v| !v.is_null())
        })
    }

    /// `column = value`. Comparisons involving `NULL` are false.
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        let column = column.into();
        Self::new(format!("{column} = {value}"), move |row| {
            !value.is_null() && row.get(&column).is_some_and(|v| *v == value)
        })
    }

    pub fn evaluate(&self, row: &RowView<'_>) -> bool {
        (self.eval)(row)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

/// Composite index over the rows that satisfy a predicate.
///
/// The predicate is re-evaluated on every insert, update and delete, since
/// an update can move a row into or out of the index.
#[derive(Debug)]
pub struct PartialIndex {
    name: String,
    columns: Vec<String>,
    positions: Vec<usize>,
    table_columns: Arc<[Column]>,
    predicate: Predicate,
    entries: RwLock<KeyMap>,
}

impl PartialIndex {
    /// Creates an empty index. `table_columns` is the full column list of the
    /// owning table, used to evaluate the predicate by column name.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        positions: Vec<usize>,
        unique: bool,
        table_columns: Arc<[Column]>,
        predicate: Predicate,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            positions,
            table_columns,
            predicate,
            entries: RwLock::new(KeyMap::new(unique)),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Returns `true` if `row` passes the predicate.
    pub fn would_include(&self, row: &Row) -> bool {
        self.predicate
            .evaluate(&RowView::new(&self.table_columns, row))
    }

    fn key_of(&self, row: &Row) -> Option<(CompositeKey, RowId)> {
        if !self.would_include(row) {
            return None;
        }
        CompositeKey::from_row(row, &self.positions).map(|key| (key, row.id()))
    }

    pub fn find_exact(&self, values: &[Value]) -> RowIdSet {
        match CompositeKey::from_values(values) {
            Some(key) if key.len() == self.positions.len() => self.entries.read().exact(&key),
            _ => RowIdSet::new(),
        }
    }

    pub fn find_prefix(&self, prefix: &[Value]) -> RowIdSet {
        if prefix.len() > self.positions.len() || prefix.iter().any(Value::is_null) {
            return RowIdSet::new();
        }
        self.entries.read().prefix(prefix)
    }

    pub fn find_range(&self, min: &[Value], max: &[Value]) -> RowIdSet {
        match (CompositeKey::from_values(min), CompositeKey::from_values(max)) {
            (Some(min), Some(max)) => self.entries.read().range(&min, &max),
            _ => RowIdSet::new(),
        }
    }
}

impl TableIndex for PartialIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Partial
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
        let old = self.key_of(old);
        let new = self.key_of(new);
        self.entries.write().replace(&self.name, old, new)
    }

    fn find_exact(&self, key: &[Value]) -> RowIdSet {
        PartialIndex::find_exact(self, key)
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
