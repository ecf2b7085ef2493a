use std::collections::BTreeSet;
use std::mem;

use tracing::trace;

use super::node::{InternalNode, LeafNode, Node, NodeId};
use crate::config::BPlusTreeConfig;
use crate::error::Result;

/// In-memory B+ tree mapping each key to a set of values.
///
/// Nodes are kept in an arena and addressed by [NodeId]; freed slots are
/// recycled. Leaves are chained in ascending key order so range scans walk
/// the chain instead of re-descending the tree.
///
/// The tree is not internally synchronized; wrap it in a lock to share it
/// (see [BPlusTreeIndex](crate::index::BPlusTreeIndex)).
#[derive(Debug, Clone)]
pub struct BPlusTree<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<NodeId>,
    root: NodeId,
    first_leaf: NodeId,
    config: BPlusTreeConfig,
    len: usize,
    total_values: usize,
}

/// Internal nodes visited on the way down, with the child index taken in each.
type Path = Vec<(NodeId, usize)>;

impl<K: Ord + Clone, V: Ord + Clone> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::empty(BPlusTreeConfig::default())
    }
}

impl<K: Ord + Clone, V: Ord + Clone> BPlusTree<K, V> {
    /// Creates an empty tree.
    ///
    /// # Errors
    /// Returns a configuration error if the order is too small.
    pub fn new(config: BPlusTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::empty(config))
    }

    fn empty(config: BPlusTreeConfig) -> Self {
        Self {
            nodes: vec![Node::Leaf(LeafNode::default())],
            free: Vec::new(),
            root: 0,
            first_leaf: 0,
            config,
            len: 0,
            total_values: 0,
        }
    }

    pub fn config(&self) -> BPlusTreeConfig {
        self.config
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of (key, value) pairs.
    pub fn total_values(&self) -> usize {
        self.total_values
    }

    /// Number of levels, a lone root leaf being height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id] {
            id = node.children[0];
            height += 1;
        }
        height
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        *self = Self::empty(self.config);
    }

    // ─────────────────────────────────────────────────────────────
    // Arena helpers
    // ─────────────────────────────────────────────────────────────

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = Node::Leaf(LeafNode::default());
        self.free.push(id);
    }

    /// Moves a node out of its slot so it can be edited alongside others.
    fn take(&mut self, id: NodeId) -> Node<K, V> {
        mem::replace(&mut self.nodes[id], Node::Leaf(LeafNode::default()))
    }

    fn put(&mut self, id: NodeId, node: Node<K, V>) {
        self.nodes[id] = node;
    }

    fn leaf(&self, id: NodeId) -> &LeafNode<K, V> {
        match &self.nodes[id] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode<K, V> {
        match &mut self.nodes[id] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode<K> {
        match &mut self.nodes[id] {
            Node::Internal(node) => node,
            Node::Leaf(_) => unreachable!("node {id} is not an internal node"),
        }
    }

    /// Descends to the leaf that holds or would hold `key`.
    fn find_leaf(&self, key: &K) -> NodeId {
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id] {
            id = node.children[node.child_index(key)];
        }
        id
    }

    fn find_leaf_with_path(&self, key: &K) -> (NodeId, Path) {
        let mut path = Vec::new();
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id] {
            let idx = node.child_index(key);
            path.push((id, idx));
            id = node.children[idx];
        }
        (id, path)
    }

    // ─────────────────────────────────────────────────────────────
    // Insertion
    // ─────────────────────────────────────────────────────────────

    /// Adds `value` to the set held under `key`.
    ///
    /// Returns `false` if the pair was already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let (leaf_id, path) = self.find_leaf_with_path(&key);
        let max_keys = self.config.max_keys();
        let leaf = self.leaf_mut(leaf_id);

        let overflow = match leaf.search(&key) {
            Ok(pos) => {
                if !leaf.values[pos].insert(value) {
                    return false;
                }
                false
            }
            Err(pos) => {
                leaf.keys.insert(pos, key);
                leaf.values.insert(pos, BTreeSet::from([value]));
                self.len += 1;
                self.leaf(leaf_id).keys.len() > max_keys
            }
        };
        self.total_values += 1;

        if overflow {
            self.split_leaf(leaf_id, path);
        }
        true
    }

    fn split_leaf(&mut self, leaf_id: NodeId, path: Path) {
        let (separator, right) = self.leaf_mut(leaf_id).split();
        let right_id = self.alloc(Node::Leaf(right));
        self.leaf_mut(leaf_id).next = Some(right_id);
        trace!(left = leaf_id, right = right_id, "split B+ tree leaf");
        self.insert_into_parent(leaf_id, separator, right_id, path);
    }

    /// Hooks a freshly split-off `right` node in after `left`, splitting
    /// ancestors as long as they overflow.
    fn insert_into_parent(
        &mut self,
        mut left: NodeId,
        mut separator: K,
        mut right: NodeId,
        mut path: Path,
    ) {
        let max_keys = self.config.max_keys();
        loop {
            let Some((parent, idx)) = path.pop() else {
                let root = self.alloc(Node::Internal(InternalNode::new(separator, left, right)));
                self.root = root;
                trace!(root, "grew B+ tree root");
                return;
            };

            let node = self.internal_mut(parent);
            node.insert_child(idx, separator, right);
            if node.keys.len() <= max_keys {
                return;
            }

            let (promoted, sibling) = node.split();
            let sibling_id = self.alloc(Node::Internal(sibling));
            trace!(left = parent, right = sibling_id, "split B+ tree internal node");
            left = parent;
            separator = promoted;
            right = sibling_id;
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────

    /// Removes `value` from the set held under `key`, dropping the key when
    /// its set becomes empty.
    ///
    /// Returns `false` if the pair was not present.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let (leaf_id, path) = self.find_leaf_with_path(key);
        let leaf = self.leaf_mut(leaf_id);
        let Ok(pos) = leaf.search(key) else {
            return false;
        };
        if !leaf.values[pos].remove(value) {
            return false;
        }
        self.total_values -= 1;

        if self.leaf(leaf_id).values[pos].is_empty() {
            self.remove_slot(leaf_id, pos, path);
        }
        true
    }

    /// Removes `key` with all of its values.
    pub fn remove_key(&mut self, key: &K) -> Option<BTreeSet<V>> {
        let (leaf_id, path) = self.find_leaf_with_path(key);
        let pos = self.leaf(leaf_id).search(key).ok()?;
        let values = mem::take(&mut self.leaf_mut(leaf_id).values[pos]);
        self.total_values -= values.len();
        self.remove_slot(leaf_id, pos, path);
        Some(values)
    }

    fn remove_slot(&mut self, leaf_id: NodeId, pos: usize, path: Path) {
        let leaf = self.leaf_mut(leaf_id);
        leaf.keys.remove(pos);
        leaf.values.remove(pos);
        self.len -= 1;
        self.rebalance(leaf_id, path);
    }

    /// Restores minimum occupancy from `id` upwards by borrowing from or
    /// merging with an adjacent sibling under the same parent.
    fn rebalance(&mut self, mut id: NodeId, mut path: Path) {
        let min_keys = self.config.min_keys();
        loop {
            let Some((parent, idx)) = path.pop() else {
                // the root has no lower bound
                return;
            };
            if self.nodes[id].len() >= min_keys {
                return;
            }

            let (left, right) = {
                let Node::Internal(p) = &self.nodes[parent] else {
                    unreachable!("node {parent} is not an internal node")
                };
                (
                    idx.checked_sub(1).map(|i| p.children[i]),
                    p.children.get(idx + 1).copied(),
                )
            };

            if let Some(left) = left.filter(|&l| self.nodes[l].len() > min_keys) {
                self.borrow_from_left(parent, idx, left, id);
                return;
            }
            if let Some(right) = right.filter(|&r| self.nodes[r].len() > min_keys) {
                self.borrow_from_right(parent, idx, id, right);
                return;
            }
            match (left, right) {
                (Some(left), _) => self.merge(parent, idx - 1, left, id),
                (None, Some(right)) => self.merge(parent, idx, id, right),
                (None, None) => return,
            }

            if parent == self.root {
                if self.nodes[parent].is_empty() {
                    let Node::Internal(old_root) = self.take(parent) else {
                        unreachable!("root {parent} is not an internal node")
                    };
                    self.root = old_root.children[0];
                    self.release(parent);
                    trace!(root = self.root, "collapsed B+ tree root");
                }
                return;
            }
            id = parent;
        }
    }

    fn borrow_from_left(&mut self, parent: NodeId, idx: usize, left: NodeId, id: NodeId) {
        let mut left_node = self.take(left);
        let mut node = self.take(id);
        let separator = &mut self.internal_mut(parent).keys[idx - 1];

        match (&mut left_node, &mut node) {
            (Node::Leaf(l), Node::Leaf(n)) => {
                if let (Some(k), Some(v)) = (l.keys.pop(), l.values.pop()) {
                    *separator = k.clone();
                    n.keys.insert(0, k);
                    n.values.insert(0, v);
                }
            }
            (Node::Internal(l), Node::Internal(n)) => {
                if let (Some(k), Some(c)) = (l.keys.pop(), l.children.pop()) {
                    n.keys.insert(0, mem::replace(separator, k));
                    n.children.insert(0, c);
                }
            }
            _ => unreachable!("siblings {left} and {id} are on different levels"),
        }

        self.put(left, left_node);
        self.put(id, node);
        trace!(from = left, to = id, "borrowed from left B+ tree sibling");
    }

    fn borrow_from_right(&mut self, parent: NodeId, idx: usize, id: NodeId, right: NodeId) {
        let mut node = self.take(id);
        let mut right_node = self.take(right);
        let separator = &mut self.internal_mut(parent).keys[idx];

        match (&mut node, &mut right_node) {
            (Node::Leaf(n), Node::Leaf(r)) => {
                n.keys.push(r.keys.remove(0));
                n.values.push(r.values.remove(0));
                *separator = r.keys[0].clone();
            }
            (Node::Internal(n), Node::Internal(r)) => {
                let k = r.keys.remove(0);
                n.keys.push(mem::replace(separator, k));
                n.children.push(r.children.remove(0));
            }
            _ => unreachable!("siblings {id} and {right} are on different levels"),
        }

        self.put(id, node);
        self.put(right, right_node);
        trace!(from = right, to = id, "borrowed from right B+ tree sibling");
    }

    /// Folds `right` into `left`, removing their separator `keys[sep_idx]` from `parent`.
    fn merge(&mut self, parent: NodeId, sep_idx: usize, left: NodeId, right: NodeId) {
        let right_node = self.take(right);
        let parent_node = self.internal_mut(parent);
        let separator = parent_node.keys.remove(sep_idx);
        parent_node.children.remove(sep_idx + 1);

        match (&mut self.nodes[left], right_node) {
            (Node::Leaf(l), Node::Leaf(r)) => l.merge(r),
            (Node::Internal(l), Node::Internal(r)) => l.merge(separator, r),
            _ => unreachable!("siblings {left} and {right} are on different levels"),
        }

        self.release(right);
        trace!(into = left, from = right, "merged B+ tree siblings");
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    /// Values held under `key`.
    pub fn find(&self, key: &K) -> Option<&BTreeSet<V>> {
        let leaf = self.leaf(self.find_leaf(key));
        leaf.search(key).ok().map(|pos| &leaf.values[pos])
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.find(key).is_some_and(|values| values.contains(value))
    }

    /// Union of the value sets of all keys in `[min, max]`.
    pub fn find_range(&self, min: &K, max: &K) -> BTreeSet<V> {
        if min > max {
            return BTreeSet::new();
        }
        let leaf_id = self.find_leaf(min);
        let pos = self.leaf(leaf_id).lower_bound(min);
        self.collect_from(leaf_id, pos, |k| k <= max)
    }

    /// Union of the value sets of all keys `< key`.
    pub fn find_less_than(&self, key: &K) -> BTreeSet<V> {
        self.collect_from(self.first_leaf, 0, |k| k < key)
    }

    /// Union of the value sets of all keys `> key`.
    pub fn find_greater_than(&self, key: &K) -> BTreeSet<V> {
        let leaf_id = self.find_leaf(key);
        let pos = self.leaf(leaf_id).upper_bound(key);
        self.collect_from(leaf_id, pos, |_| true)
    }

    /// Walks the leaf chain from `(leaf_id, pos)` while `in_range` holds.
    fn collect_from(
        &self,
        leaf_id: NodeId,
        pos: usize,
        mut in_range: impl FnMut(&K) -> bool,
    ) -> BTreeSet<V> {
        let mut result = BTreeSet::new();
        let iter = Iter {
            tree: self,
            leaf: Some(leaf_id),
            pos,
        };
        for (key, values) in iter {
            if !in_range(key) {
                break;
            }
            result.extend(values.iter().cloned());
        }
        result
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            leaf: Some(self.first_leaf),
            pos: 0,
        }
    }

    pub fn first_key(&self) -> Option<&K> {
        self.leaf(self.first_leaf).keys.first()
    }

    pub fn last_key(&self) -> Option<&K> {
        let mut id = self.root;
        while let Node::Internal(node) = &self.nodes[id] {
            id = node.children[node.children.len() - 1];
        }
        self.leaf(id).keys.last()
    }

    // ─────────────────────────────────────────────────────────────
    // Structural checks
    // ─────────────────────────────────────────────────────────────

    /// Verifies ordering, occupancy, depth, routing, the leaf chain and the
    /// counters. Returns a description of the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.check_node(self.root, None, None, 1, &mut leaf_depth, &mut leaves)?;

        if leaves.first() != Some(&self.first_leaf) {
            return Err(format!(
                "first leaf is {} but leftmost leaf is {:?}",
                self.first_leaf,
                leaves.first()
            ));
        }
        for pair in leaves.windows(2) {
            let next = self.leaf(pair[0]).next;
            if next != Some(pair[1]) {
                return Err(format!(
                    "leaf {} links to {:?} instead of {}",
                    pair[0], next, pair[1]
                ));
            }
        }
        if let Some(&last) = leaves.last() {
            if self.leaf(last).next.is_some() {
                return Err(format!("last leaf {last} has a next link"));
            }
        }

        let mut keys = 0;
        let mut values = 0;
        let mut previous: Option<&K> = None;
        for (key, set) in self.iter() {
            if previous.is_some_and(|p| p >= key) {
                return Err("leaf chain is not strictly ascending".to_string());
            }
            if set.is_empty() {
                return Err("key with an empty value set".to_string());
            }
            previous = Some(key);
            keys += 1;
            values += set.len();
        }
        if keys != self.len || values != self.total_values {
            return Err(format!(
                "counters say {}/{} but tree holds {keys}/{values}",
                self.len, self.total_values
            ));
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<NodeId>,
    ) -> std::result::Result<(), String> {
        let node = &self.nodes[id];
        let keys = node.keys();

        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("node {id} keys are not strictly sorted"));
        }
        if keys.len() > self.config.max_keys() {
            return Err(format!("node {id} holds {} keys", keys.len()));
        }
        if id != self.root && keys.len() < self.config.min_keys() {
            return Err(format!("node {id} underflows with {} keys", keys.len()));
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first < lower {
                return Err(format!("node {id} has a key below its lower bound"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                return Err(format!("node {id} has a key at or above its upper bound"));
            }
        }

        match node {
            Node::Leaf(_) => {
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(format!("leaf {id} at depth {depth}, expected {d}"));
                    }
                    Some(_) => {}
                }
                leaves.push(id);
            }
            Node::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(format!("internal node {id} child count mismatch"));
                }
                if id == self.root && internal.keys.is_empty() {
                    return Err("internal root without keys".to_string());
                }
                for (i, &child) in internal.children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(&internal.keys[i - 1]) };
                    let child_upper = internal.keys.get(i).or(upper);
                    self.check_node(child, child_lower, child_upper, depth + 1, leaf_depth, leaves)?;
                }
            }
        }
        Ok(())
    }
}

/// Iterator over the leaf chain, see [BPlusTree::iter].
pub struct Iter<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    pos: usize,
}

impl<'a, K: Ord + Clone, V: Ord + Clone> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a BTreeSet<V>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.tree.leaf(self.leaf?);
            if self.pos < leaf.keys.len() {
                let item = (&leaf.keys[self.pos], &leaf.values[self.pos]);
                self.pos += 1;
                return Some(item);
            }
            self.leaf = leaf.next;
            self.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::*;

    fn tree(order: usize) -> BPlusTree<i64, u32> {
        BPlusTree::new(BPlusTreeConfig::with_order(order)).unwrap()
    }

    #[test]
    fn test_empty_tree() {
        let t = tree(4);
        assert!(t.is_empty());
        assert_eq!(t.height(), 1);
        assert_eq!(t.find(&1), None);
        assert!(t.find_range(&0, &10).is_empty());
        assert_eq!(t.first_key(), None);
        assert_eq!(t.last_key(), None);
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_rejects_tiny_order() {
        assert!(BPlusTree::<i64, u32>::new(BPlusTreeConfig::with_order(2)).is_err());
    }

    #[test]
    fn test_multimap_insert() {
        let mut t = tree(4);
        assert!(t.insert(5, 1));
        assert!(t.insert(5, 2));
        assert!(!t.insert(5, 2));

        assert_eq!(t.len(), 1);
        assert_eq!(t.total_values(), 2);
        assert_eq!(t.find(&5), Some(&BTreeSet::from([1, 2])));
        assert!(t.contains(&5, &1));
        assert!(!t.contains(&5, &3));
    }

    #[test]
    fn test_splits_grow_height_and_keep_order() {
        let mut t = tree(3);
        for k in 0..100 {
            t.insert(k, k as u32);
            t.check_invariants().unwrap();
        }
        assert!(t.height() >= 4);
        assert_eq!(t.len(), 100);
        let keys: Vec<i64> = t.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());
        assert_eq!(t.first_key(), Some(&0));
        assert_eq!(t.last_key(), Some(&99));
    }

    #[test]
    fn test_descending_inserts() {
        let mut t = tree(4);
        for k in (0..50).rev() {
            t.insert(k, 0);
        }
        t.check_invariants().unwrap();
        assert_eq!(t.iter().next().map(|(k, _)| *k), Some(0));
    }

    #[test]
    fn test_range_queries() {
        let mut t = tree(4);
        for k in 0..30 {
            t.insert(k * 2, k as u32);
        }

        assert_eq!(t.find_range(&10, &16), BTreeSet::from([5, 6, 7, 8]));
        assert_eq!(t.find_range(&11, &15), BTreeSet::from([6, 7]));
        assert!(t.find_range(&16, &10).is_empty());
        assert_eq!(t.find_less_than(&6), BTreeSet::from([0, 1, 2]));
        assert_eq!(t.find_greater_than(&52), BTreeSet::from([27, 28, 29]));
        assert_eq!(t.find_greater_than(&53), BTreeSet::from([27, 28, 29]));
        assert!(t.find_greater_than(&58).is_empty());
    }

    #[test]
    fn test_remove_value_then_key() {
        let mut t = tree(4);
        t.insert(1, 10);
        t.insert(1, 11);

        assert!(t.remove(&1, &10));
        assert!(!t.remove(&1, &10));
        assert_eq!(t.len(), 1);
        assert!(t.remove(&1, &11));
        assert_eq!(t.len(), 0);
        assert_eq!(t.total_values(), 0);
        assert_eq!(t.find(&1), None);
        assert!(!t.remove(&2, &0));
    }

    #[test]
    fn test_remove_everything_shrinks_back_to_a_leaf() {
        let mut t = tree(3);
        for k in 0..200 {
            t.insert(k, 0);
        }
        for k in 0..200 {
            assert!(t.remove(&k, &0));
            t.check_invariants().unwrap();
        }
        assert!(t.is_empty());
        assert_eq!(t.height(), 1);
        assert_eq!(t.node_count(), 1);
    }

    #[test]
    fn test_remove_key_returns_all_values() {
        let mut t = tree(4);
        for k in 0..20 {
            t.insert(k, 1);
            t.insert(k, 2);
        }
        assert_eq!(t.remove_key(&7), Some(BTreeSet::from([1, 2])));
        assert_eq!(t.remove_key(&7), None);
        assert_eq!(t.total_values(), 38);
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_freed_nodes_are_recycled() {
        let mut t = tree(3);
        for k in 0..64 {
            t.insert(k, 0);
        }
        let arena = t.nodes.len();
        for k in 0..64 {
            t.remove(&k, &0);
        }
        for k in 0..64 {
            t.insert(k, 0);
        }
        assert_eq!(t.nodes.len(), arena);
        t.check_invariants().unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(i16, u8),
        Remove(i16, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<i16>().prop_map(|k| k % 64), 0u8..4).prop_map(|(k, v)| Op::Insert(k, v)),
            (any::<i16>().prop_map(|k| k % 64), 0u8..4).prop_map(|(k, v)| Op::Remove(k, v)),
        ]
    }

    proptest! {
        #[test]
        fn matches_btreemap_model(order in 3usize..8, ops in vec(op(), 0..400)) {
            let mut t = BPlusTree::new(BPlusTreeConfig::with_order(order)).unwrap();
            let mut model: BTreeMap<i16, BTreeSet<u8>> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        let expected = model.entry(k).or_default().insert(v);
                        prop_assert_eq!(t.insert(k, v), expected);
                    }
                    Op::Remove(k, v) => {
                        let expected = model.get_mut(&k).is_some_and(|s| s.remove(&v));
                        if model.get(&k).is_some_and(BTreeSet::is_empty) {
                            model.remove(&k);
                        }
                        prop_assert_eq!(t.remove(&k, &v), expected);
                    }
                }
            }

            prop_assert!(t.check_invariants().is_ok(), "{:?}", t.check_invariants());
            prop_assert_eq!(t.len(), model.len());
            let entries: Vec<(i16, BTreeSet<u8>)> =
                t.iter().map(|(k, v)| (*k, v.clone())).collect();
            let expected: Vec<(i16, BTreeSet<u8>)> = model.into_iter().collect();
            prop_assert_eq!(entries, expected);
        }

        #[test]
        fn range_is_union_of_point_lookups(
            keys in vec(-100i64..100, 0..200),
            min in -120i64..120,
            max in -120i64..120,
        ) {
            let mut t = BPlusTree::new(BPlusTreeConfig::with_order(4)).unwrap();
            for (i, k) in keys.iter().enumerate() {
                t.insert(*k, i);
            }

            let mut expected = BTreeSet::new();
            for k in min..=max {
                if let Some(values) = t.find(&k) {
                    expected.extend(values.iter().copied());
                }
            }
            prop_assert_eq!(t.find_range(&min, &max), expected);
        }
    }
}
