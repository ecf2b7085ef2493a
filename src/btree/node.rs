//! B+ tree nodes.
//!
//! Nodes live in an arena owned by [BPlusTree](super::BPlusTree) and refer to
//! each other by [NodeId]. Routing rule for internal nodes: `children[i]`
//! holds keys `< keys[i]`, `children[i + 1]` holds keys `>= keys[i]`.

use std::collections::BTreeSet;

/// Arena slot of a node.
pub type NodeId = usize;

/// Leaf node: sorted keys, one value set per key, link to the next leaf.
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<BTreeSet<V>>,
    pub next: Option<NodeId>,
}

/// Internal node: sorted separator keys and `keys.len() + 1` children.
#[derive(Debug, Clone)]
pub struct InternalNode<K> {
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Node<K, V> {
    Leaf(LeafNode<K, V>),
    Internal(InternalNode<K>),
}

impl<K, V> Default for LeafNode<K, V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
        }
    }
}

impl<K: Ord + Clone, V: Ord> LeafNode<K, V> {
    /// Position of `key`, or where it would be inserted.
    pub fn search(&self, key: &K) -> Result<usize, usize> {
        self.keys.binary_search(key)
    }

    /// Index of the first key `>= key`.
    pub fn lower_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Index of the first key `> key`.
    pub fn upper_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Moves the upper half of the entries into a new right sibling.
    ///
    /// Returns the separator (first key of the right node) and the right node.
    /// The right node inherits this leaf's `next` link; linking this leaf to
    /// the right node is left to the caller, which owns the arena slot.
    pub fn split(&mut self) -> (K, LeafNode<K, V>) {
        let mid = self.keys.len() / 2;
        let keys = self.keys.split_off(mid);
        let values = self.values.split_off(mid);
        let separator = keys[0].clone();
        let right = LeafNode {
            keys,
            values,
            next: self.next.take(),
        };
        (separator, right)
    }

    /// Appends all entries of `right`, which must hold strictly larger keys.
    pub fn merge(&mut self, right: LeafNode<K, V>) {
        self.keys.extend(right.keys);
        self.values.extend(right.values);
        self.next = right.next;
    }
}

impl<K: Ord + Clone> InternalNode<K> {
    pub fn new(separator: K, left: NodeId, right: NodeId) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    /// Index of the child whose subtree may contain `key`.
    pub fn child_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Registers `right` as the sibling following `children[idx]`, separated by `separator`.
    pub fn insert_child(&mut self, idx: usize, separator: K, right: NodeId) {
        self.keys.insert(idx, separator);
        self.children.insert(idx + 1, right);
    }

    /// Splits around the middle key, which moves up to the parent.
    ///
    /// Returns the promoted key and the new right node.
    pub fn split(&mut self) -> (K, InternalNode<K>) {
        let mid = self.keys.len() / 2;
        let mut keys = self.keys.split_off(mid);
        let promoted = keys.remove(0);
        let children = self.children.split_off(mid + 1);
        (promoted, InternalNode { keys, children })
    }

    /// Absorbs `right` with `separator` (pulled down from the parent) between them.
    pub fn merge(&mut self, separator: K, right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.extend(right.keys);
        self.children.extend(right.children);
    }
}

impl<K, V> Node<K, V> {
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf(leaf) => leaf.keys.len(),
            Self::Internal(internal) => internal.keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn keys(&self) -> &[K] {
        match self {
            Self::Leaf(leaf) => &leaf.keys,
            Self::Internal(internal) => &internal.keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(keys: &[i32]) -> LeafNode<i32, u32> {
        LeafNode {
            keys: keys.to_vec(),
            values: keys.iter().map(|&k| BTreeSet::from([k as u32])).collect(),
            next: Some(99),
        }
    }

    #[test]
    fn test_leaf_split_moves_upper_half() {
        let mut left = leaf(&[1, 2, 3, 4, 5]);
        let (separator, right) = left.split();

        assert_eq!(separator, 3);
        assert_eq!(left.keys, vec![1, 2]);
        assert_eq!(right.keys, vec![3, 4, 5]);
        assert_eq!(right.values[0], BTreeSet::from([3]));
        assert_eq!(left.next, None);
        assert_eq!(right.next, Some(99));
    }

    #[test]
    fn test_leaf_bounds() {
        let node = leaf(&[10, 20, 20, 30]);
        assert_eq!(node.lower_bound(&20), 1);
        assert_eq!(node.upper_bound(&20), 3);
        assert_eq!(node.search(&25), Err(3));
    }

    #[test]
    fn test_internal_split_promotes_middle() {
        let mut node = InternalNode {
            keys: vec![10, 20, 30, 40],
            children: vec![0, 1, 2, 3, 4],
        };
        let (promoted, right) = node.split();

        assert_eq!(promoted, 30);
        assert_eq!(node.keys, vec![10, 20]);
        assert_eq!(node.children, vec![0, 1, 2]);
        assert_eq!(right.keys, vec![40]);
        assert_eq!(right.children, vec![3, 4]);
    }

    #[test]
    fn test_internal_routing_and_merge() {
        let mut node = InternalNode::new(10, 0, 1);
        assert_eq!(node.child_index(&9), 0);
        assert_eq!(node.child_index(&10), 1);

        node.merge(
            20,
            InternalNode {
                keys: vec![30],
                children: vec![2, 3],
            },
        );
        assert_eq!(node.keys, vec![10, 20, 30]);
        assert_eq!(node.children, vec![0, 1, 2, 3]);
    }
}
