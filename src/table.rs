use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::column::Column;
use crate::config::BPlusTreeConfig;
use crate::error::{Result, StoreError};
use crate::index::{
    BPlusTreeIndex, CompositeIndex, OrderedIndex, PartialIndex, Predicate, RowIdSet, TableIndex,
};
use crate::row::{Row, RowId};
use crate::value::Value;

/// First id handed out by a fresh table.
const FIRST_ROW_ID: RowId = 1;

/// Everything guarded by the table lock.
#[derive(Debug)]
struct TableData {
    rows: BTreeMap<RowId, Row>,
    next_id: RowId,
    indexes: BTreeMap<String, Arc<dyn TableIndex>>,
}

/// In-memory table: rows keyed by id plus the indexes maintained over them.
///
/// All mutations take the table's write lock for the row change *and* the
/// fan-out to every index, so index updates for one row are never
/// interleaved with another mutation of the same table. Reads take the read
/// lock and return owned copies.
///
/// A mutation is all-or-nothing: every index is asked whether it accepts the
/// change before any index or row is touched.
#[derive(Debug)]
pub struct Table {
    name: String,
    columns: Arc<[Column]>,
    data: RwLock<TableData>,
}

impl Table {
    /// Creates an empty table.
    ///
    /// # Errors
    /// Returns [StoreError::DuplicateColumn] if two columns share a name.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(StoreError::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns: columns.into(),
            data: RwLock::new(TableData {
                rows: BTreeMap::new(),
                next_id: FIRST_ROW_ID,
                indexes: BTreeMap::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_position(name)
            .ok_or_else(|| StoreError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Checks arity, nullability and type of `values` against the columns.
    ///
    /// # Errors
    /// Returns the first violation found, naming the offending column.
    pub fn validate(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(StoreError::ArityMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        self.columns
            .iter()
            .zip(values)
            .try_for_each(|(column, value)| column.validate(&self.name, value))
    }

    // ─────────────────────────────────────────────────────────────
    // Row mutations
    // ─────────────────────────────────────────────────────────────

    /// Inserts a row and returns its newly assigned id.
    ///
    /// # Errors
    /// - a validation error if `values` do not fit the columns;
    /// - [StoreError::UniqueViolation] if a unique index rejects the row;
    /// - [StoreError::RowIdExhausted] once the generator reaches `i64::MAX`.
    ///
    /// In every case neither the table nor any index is modified.
    pub fn insert(&self, values: Vec<Value>) -> Result<RowId> {
        self.validate(&values)?;
        let mut data = self.data.write();
        let id = data.next_id;
        let next_id = self.successor(id)?;
        self.store_new(&mut data, Row::new(id, values))?;
        data.next_id = next_id;
        Ok(id)
    }

    /// Inserts a row under a caller-chosen id, for replaying a rolled-back
    /// delete. The id generator is advanced past `id` so it never hands the
    /// id out again.
    ///
    /// # Errors
    /// Same as [Table::insert], plus [StoreError::DuplicateRowId] if the id
    /// is in use and [StoreError::RowIdExhausted] if the generator cannot
    /// move past it.
    pub fn insert_with_id(&self, id: RowId, values: Vec<Value>) -> Result<()> {
        self.validate(&values)?;
        let mut data = self.data.write();
        if data.rows.contains_key(&id) {
            return Err(StoreError::DuplicateRowId {
                table: self.name.clone(),
                id,
            });
        }
        let next_id = if id >= data.next_id {
            self.successor(id)?
        } else {
            data.next_id
        };
        self.store_new(&mut data, Row::new(id, values))?;
        data.next_id = next_id;
        Ok(())
    }

    /// Generator value after handing out `id`.
    fn successor(&self, id: RowId) -> Result<RowId> {
        id.checked_add(1).ok_or_else(|| StoreError::RowIdExhausted {
            table: self.name.clone(),
        })
    }

    fn store_new(&self, data: &mut TableData, row: Row) -> Result<()> {
        for index in data.indexes.values() {
            index.check_insert(&row)?;
        }
        for (applied, index) in data.indexes.values().enumerate() {
            if let Err(err) = index.insert(&row) {
                warn!(table = %self.name, index = index.name(), row_id = row.id(), "undoing partial insert");
                for undo in data.indexes.values().take(applied) {
                    undo.delete(&row);
                }
                return Err(err);
            }
        }
        trace!(table = %self.name, row_id = row.id(), indexes = data.indexes.len(), "inserted row");
        data.rows.insert(row.id(), row);
        Ok(())
    }

    /// Replaces the values of row `id`.
    ///
    /// Returns `Ok(false)` if there is no such row.
    ///
    /// # Errors
    /// - a validation error if `values` do not fit the columns;
    /// - [StoreError::UniqueViolation] if a unique index rejects the new key.
    ///
    /// In both cases neither the table nor any index is modified.
    pub fn update(&self, id: RowId, values: Vec<Value>) -> Result<bool> {
        let mut data = self.data.write();
        let Some(old) = data.rows.get(&id).cloned() else {
            return Ok(false);
        };
        self.validate(&values)?;
        let new = Row::new(id, values);

        for index in data.indexes.values() {
            index.check_update(&old, &new)?;
        }
        for (applied, index) in data.indexes.values().enumerate() {
            if let Err(err) = index.update(&old, &new) {
                warn!(table = %self.name, index = index.name(), row_id = id, "undoing partial update");
                for undo in data.indexes.values().take(applied) {
                    if let Err(undo_err) = undo.update(&new, &old) {
                        warn!(index = undo.name(), error = %undo_err, "failed to restore index entry");
                    }
                }
                return Err(err);
            }
        }
        trace!(table = %self.name, row_id = id, "updated row");
        data.rows.insert(id, new);
        Ok(true)
    }

    /// Removes row `id`. Returns `false` if there is no such row.
    pub fn delete(&self, id: RowId) -> bool {
        let mut data = self.data.write();
        let Some(row) = data.rows.remove(&id) else {
            return false;
        };
        for index in data.indexes.values() {
            index.delete(&row);
        }
        trace!(table = %self.name, row_id = id, "deleted row");
        true
    }

    // ─────────────────────────────────────────────────────────────
    // Row reads
    // ─────────────────────────────────────────────────────────────

    pub fn get_row(&self, id: RowId) -> Option<Row> {
        self.data.read().rows.get(&id).cloned()
    }

    /// All rows in id order.
    pub fn get_all_rows(&self) -> Vec<Row> {
        self.data.read().rows.values().cloned().collect()
    }

    pub fn row_count(&self) -> usize {
        self.data.read().rows.len()
    }

    /// Resolves index results back to rows, skipping ids that are gone.
    pub fn rows_by_ids(&self, ids: &RowIdSet) -> Vec<Row> {
        let data = self.data.read();
        ids.iter()
            .filter_map(|id| data.rows.get(id).cloned())
            .collect()
    }

    /// Full scan: every row for which `filter` returns `true`, in id order.
    pub fn scan(&self, mut filter: impl FnMut(&Row) -> bool) -> Vec<Row> {
        self.data
            .read()
            .rows
            .values()
            .filter(|row| filter(row))
            .cloned()
            .collect()
    }

    /// Id the next [Table::insert] will assign.
    pub fn next_row_id(&self) -> RowId {
        self.data.read().next_id
    }

    /// Heap bytes held by the stored rows.
    pub fn memory_usage(&self) -> usize {
        allocative::size_of_unique_allocated_data(&self.data.read().rows)
    }

    // ─────────────────────────────────────────────────────────────
    // Indexes
    // ─────────────────────────────────────────────────────────────

    /// Creates a single-column ordered index and fills it from the current rows.
    ///
    /// # Errors
    /// Fails if the column does not exist or the name is taken.
    pub fn create_index(&self, column: &str, name: &str) -> Result<Arc<OrderedIndex>> {
        let mut data = self.data.write();
        Self::require_free_name(&data, name)?;
        let position = self.require_column(column)?;
        self.register(&mut data, OrderedIndex::new(name, column, position))
    }

    /// Creates a multi-column index over `columns`, in key order.
    ///
    /// # Errors
    /// Fails on an empty or unknown column list or a taken name. A unique
    /// index also fails if the existing rows hold duplicate keys.
    pub fn create_composite_index(
        &self,
        name: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<Arc<CompositeIndex>> {
        let mut data = self.data.write();
        Self::require_free_name(&data, name)?;
        let (columns, positions) = self.resolve_columns(name, columns)?;
        self.register(
            &mut data,
            CompositeIndex::new(name, columns, positions, unique),
        )
    }

    /// Creates a multi-column index restricted to rows matching `predicate`.
    ///
    /// # Errors
    /// Same as [Table::create_composite_index].
    pub fn create_partial_index(
        &self,
        name: &str,
        columns: &[&str],
        unique: bool,
        predicate: Predicate,
    ) -> Result<Arc<PartialIndex>> {
        let mut data = self.data.write();
        Self::require_free_name(&data, name)?;
        let (columns, positions) = self.resolve_columns(name, columns)?;
        let index = PartialIndex::new(
            name,
            columns,
            positions,
            unique,
            Arc::clone(&self.columns),
            predicate,
        );
        self.register(&mut data, index)
    }

    /// Creates a single-column index backed by a B+ tree.
    ///
    /// # Errors
    /// Fails if the column does not exist, the name is taken or `config` is invalid.
    pub fn create_bplus_tree_index(
        &self,
        column: &str,
        name: &str,
        config: BPlusTreeConfig,
    ) -> Result<Arc<BPlusTreeIndex>> {
        let mut data = self.data.write();
        Self::require_free_name(&data, name)?;
        let position = self.require_column(column)?;
        let index = BPlusTreeIndex::new(name, column, position, config)?;
        self.register(&mut data, index)
    }

    fn require_free_name(data: &TableData, name: &str) -> Result<()> {
        if data.indexes.contains_key(name) {
            return Err(StoreError::IndexAlreadyExists(name.to_string()));
        }
        Ok(())
    }

    fn resolve_columns(&self, index: &str, columns: &[&str]) -> Result<(Vec<String>, Vec<usize>)> {
        if columns.is_empty() {
            return Err(StoreError::EmptyIndexColumns(index.to_string()));
        }
        let positions = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        Ok((columns.iter().map(|c| c.to_string()).collect(), positions))
    }

    /// Builds `index` from the current rows and registers it.
    fn register<I: TableIndex + 'static>(&self, data: &mut TableData, index: I) -> Result<Arc<I>> {
        for row in data.rows.values() {
            index.insert(row)?;
        }
        let index = Arc::new(index);
        debug!(
            table = %self.name,
            index = index.name(),
            kind = %index.kind(),
            columns = ?index.columns(),
            keys = index.key_count(),
            "created index"
        );
        data.indexes
            .insert(index.name().to_string(), Arc::clone(&index) as Arc<dyn TableIndex>);
        Ok(index)
    }

    /// Removes an index. Returns `false` if there is no such index.
    pub fn drop_index(&self, name: &str) -> bool {
        let dropped = self.data.write().indexes.remove(name).is_some();
        if dropped {
            debug!(table = %self.name, index = name, "dropped index");
        }
        dropped
    }

    pub fn get_index(&self, name: &str) -> Option<Arc<dyn TableIndex>> {
        self.data.read().indexes.get(name).cloned()
    }

    /// Like [Table::get_index], but a missing index is an error.
    pub fn index(&self, name: &str) -> Result<Arc<dyn TableIndex>> {
        self.get_index(name)
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    /// Index names in ascending order.
    pub fn index_names(&self) -> Vec<String> {
        self.data.read().indexes.keys().cloned().collect()
    }

    pub fn index_count(&self) -> usize {
        self.data.read().indexes.len()
    }
}
