pub mod btree;
pub mod column;
pub mod config;
pub mod data_type;
pub mod error;
pub mod index;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use btree::BPlusTree;
pub use column::Column;
pub use config::BPlusTreeConfig;
pub use data_type::DataType;
pub use error::{ErrorKind, Result, StoreError};
pub use index::{
    BPlusTreeIndex, CompositeIndex, CompositeKey, IndexKind, OrderedIndex, PartialIndex,
    Predicate, RowIdSet, RowView, TableIndex,
};
pub use row::{Row, RowId};
pub use schema::Schema;
pub use table::Table;
pub use value::Value;
