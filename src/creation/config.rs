use crate::cluster::PlacementPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with shard relations already created on workers when a shard
/// cannot reach its replication factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Leave them in place and log them as orphans.
    #[default]
    RetainOrphans,
    /// Drop them again, best effort.
    DropCreated,
}

/// Shard creation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardCreationConfig {
    /// How many workers a shard may try
    pub placement_policy: PlacementPolicy,

    /// Handling of remote tables left behind by a failed shard
    pub cleanup_policy: CleanupPolicy,

    /// Upper bound on waiting for a metadata lock
    pub lock_timeout: Option<Duration>,

    /// Shard count used when a caller does not give one
    pub default_shard_count: i32,

    /// Replication factor used when a caller does not give one
    pub default_replication_factor: i32,
}

impl ShardCreationConfig {
    pub fn new() -> Self {
        Self {
            placement_policy: PlacementPolicy::SingleBackup,
            cleanup_policy: CleanupPolicy::RetainOrphans,
            lock_timeout: None,
            default_shard_count: 32,
            default_replication_factor: 1,
        }
    }

    /// Set the placement policy
    pub fn placement_policy(mut self, policy: PlacementPolicy) -> Self {
        self.placement_policy = policy;
        self
    }

    /// Set the cleanup policy
    pub fn cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }

    /// Set lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Set default shard count
    pub fn default_shard_count(mut self, shard_count: i32) -> Self {
        self.default_shard_count = shard_count;
        self
    }

    /// Set default replication factor
    pub fn default_replication_factor(mut self, replication_factor: i32) -> Self {
        self.default_replication_factor = replication_factor;
        self
    }
}

impl Default for ShardCreationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShardCreationConfig::default();
        assert_eq!(config.placement_policy, PlacementPolicy::SingleBackup);
        assert_eq!(config.cleanup_policy, CleanupPolicy::RetainOrphans);
        assert_eq!(config.default_shard_count, 32);
        assert_eq!(config.default_replication_factor, 1);
        assert!(config.lock_timeout.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ShardCreationConfig::new()
            .placement_policy(PlacementPolicy::Strict)
            .cleanup_policy(CleanupPolicy::DropCreated)
            .lock_timeout(Duration::from_secs(5))
            .default_shard_count(8)
            .default_replication_factor(2);

        assert_eq!(config.placement_policy, PlacementPolicy::Strict);
        assert_eq!(config.cleanup_policy, CleanupPolicy::DropCreated);
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.default_shard_count, 8);
        assert_eq!(config.default_replication_factor, 2);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ShardCreationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
