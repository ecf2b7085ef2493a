//! Configuration structures for the index engines.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Smallest order for which split and merge stay well defined.
pub const MIN_BTREE_ORDER: usize = 3;

/// Default fan-out of a B+ tree node.
pub const DEFAULT_BTREE_ORDER: usize = 64;

/// B+ tree shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BPlusTreeConfig {
    /// Maximum number of children of an internal node. Every node holds at
    /// most `order - 1` keys, and every non-root node at least
    /// `ceil(order / 2) - 1`.
    pub order: usize,
}

impl Default for BPlusTreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_BTREE_ORDER,
        }
    }
}

impl BPlusTreeConfig {
    pub fn with_order(order: usize) -> Self {
        Self { order }
    }

    /// Maximum number of keys a node may hold.
    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum number of keys a non-root node must hold.
    pub fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    /// # Errors
    /// Returns [StoreError::InvalidConfig] if `order` is below [MIN_BTREE_ORDER].
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_BTREE_ORDER {
            return Err(StoreError::InvalidConfig {
                name: "order".to_string(),
                value: self.order.to_string(),
                reason: format!("must be at least {MIN_BTREE_ORDER}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btree_config_defaults() {
        let config = BPlusTreeConfig::default();
        assert_eq!(config.order, 64);
        assert_eq!(config.max_keys(), 63);
        assert_eq!(config.min_keys(), 31);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_keys_odd_and_even_order() {
        assert_eq!(BPlusTreeConfig::with_order(3).min_keys(), 1);
        assert_eq!(BPlusTreeConfig::with_order(4).min_keys(), 1);
        assert_eq!(BPlusTreeConfig::with_order(5).min_keys(), 2);
    }

    #[test]
    fn test_order_too_small() {
        let err = BPlusTreeConfig::with_order(2).validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig { ref name, .. } if name == "order"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BPlusTreeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BPlusTreeConfig::default());

        let config: BPlusTreeConfig = serde_json::from_str(r#"{"order": 8}"#).unwrap();
        assert_eq!(config.order, 8);
    }
}
