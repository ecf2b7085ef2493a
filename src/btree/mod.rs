//! In-memory B+ tree multi-map.
//!
//! ```text
//!                 [ 20 | 40 ]                    internal: routes by key
//!               /      |      \
//!   [5 10 15] -> [20 30] -> [40 50 60] -> None   leaves: sorted, chained
//! ```
//!
//! Every leaf key maps to a set of values, so one key can be shared by many
//! row ids. Nodes split when they exceed `order - 1` keys and borrow from or
//! merge with a sibling when they drop below `ceil(order / 2) - 1`.

pub mod node;
pub mod tree;

pub use node::{InternalNode, LeafNode, Node, NodeId};
pub use tree::{BPlusTree, Iter};
