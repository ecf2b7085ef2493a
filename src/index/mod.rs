//! Secondary indexes over a [Table](crate::Table).
//!
//! Every index implements [TableIndex], the contract the table uses to fan a
//! row mutation out to all of its indexes. Each index owns its own lock and
//! never calls back into the table or into another index.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::row::{Row, RowId};
use crate::value::Value;

pub mod bplus;
pub mod composite;
pub mod key;
pub mod ordered;
pub mod partial;

pub use bplus::BPlusTreeIndex;
pub use composite::CompositeIndex;
pub use key::CompositeKey;
pub use ordered::OrderedIndex;
pub use partial::{PartialIndex, Predicate, RowView};

/// Row ids returned by index lookups, in ascending order.
pub type RowIdSet = BTreeSet<RowId>;

/// Which engine backs an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Single-column ordered map.
    Ordered,
    /// Multi-column ordered map, optionally unique.
    Composite,
    /// Composite index restricted to rows matching a predicate.
    Partial,
    /// Single-column B+ tree.
    BPlusTree,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ordered => "ordered",
            Self::Composite => "composite",
            Self::Partial => "partial",
            Self::BPlusTree => "b+tree",
        })
    }
}

/// Common contract of all index engines.
///
/// `check_*` methods report whether the matching mutation would succeed
/// without modifying the index. The table runs every check before it
/// applies a mutation to any index.
pub trait TableIndex: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> IndexKind;

    /// Indexed column names, in key order.
    fn columns(&self) -> &[String];

    fn is_unique(&self) -> bool {
        false
    }

    fn check_insert(&self, _row: &Row) -> Result<()> {
        Ok(())
    }

    fn check_update(&self, _old: &Row, _new: &Row) -> Result<()> {
        Ok(())
    }

    /// Adds `row` under its key. Rows whose key is absent (null, not
    /// orderable, or filtered out) are skipped.
    fn insert(&self, row: &Row) -> Result<()>;

    /// Removes `row` from under its key, pruning the key once no row holds it.
    fn delete(&self, row: &Row);

    /// Moves the row from `old`'s key to `new`'s key.
    fn update(&self, old: &Row, new: &Row) -> Result<()>;

    /// Row ids whose full key equals `key`, one value per indexed column.
    fn find_exact(&self, key: &[Value]) -> RowIdSet;

    /// Number of distinct keys.
    fn key_count(&self) -> usize;

    /// Number of (key, row id) pairs.
    fn entry_count(&self) -> usize;

    fn clear(&self);
}
