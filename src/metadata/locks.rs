use crate::core::{DbError, Result, ShardId, TableId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock as AsyncRwLock};
use tokio::time::timeout;

const PRUNE_THRESHOLD: usize = 256;

/// Object a metadata lock is taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockTag {
    /// Existence of the relation itself; protects against concurrent drops.
    Relation(TableId),
    /// The distribution metadata (shard list) of a table.
    RelationDistribution(TableId),
    /// The metadata rows of a single shard.
    ShardMetadata(ShardId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    AccessShare,
    Share,
    Exclusive,
}

impl LockMode {
    pub fn is_exclusive(&self) -> bool {
        matches!(self, LockMode::Exclusive)
    }
}

enum HeldLock {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

/// A held metadata lock; released on drop.
pub struct MetadataLockGuard {
    tag: LockTag,
    mode: LockMode,
    _held: HeldLock,
}

impl MetadataLockGuard {
    pub fn tag(&self) -> LockTag {
        self.tag
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// True if this guard is an exclusive lock on `tag`.
    pub fn is_exclusive_on(&self, tag: LockTag) -> bool {
        self.tag == tag && self.mode.is_exclusive()
    }
}

impl std::fmt::Debug for MetadataLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataLockGuard")
            .field("tag", &self.tag)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Hands out shared/exclusive locks keyed by `LockTag`.
///
/// Shared modes are compatible with each other and conflict with exclusive.
/// Locks on different tags never conflict.
#[derive(Default)]
pub struct LockManager {
    locks: Mutex<HashMap<LockTag, Arc<AsyncRwLock<()>>>>,
    lock_timeout: Option<Duration>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(lock_timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    pub async fn acquire(&self, tag: LockTag, mode: LockMode) -> Result<MetadataLockGuard> {
        let lock = self.lock_for(tag)?;
        let held = match self.lock_timeout {
            Some(limit) => timeout(limit, Self::acquire_held(lock, mode))
                .await
                .map_err(|_| {
                    DbError::LockError(format!(
                        "could not obtain {:?} lock on {:?} within {:?}",
                        mode, tag, limit
                    ))
                })?,
            None => Self::acquire_held(lock, mode).await,
        };
        Ok(MetadataLockGuard {
            tag,
            mode,
            _held: held,
        })
    }

    /// Non-blocking variant of `acquire`; `None` if the lock is taken.
    pub fn try_acquire(&self, tag: LockTag, mode: LockMode) -> Result<Option<MetadataLockGuard>> {
        let lock = self.lock_for(tag)?;
        let held = if mode.is_exclusive() {
            lock.try_write_owned().ok().map(HeldLock::Exclusive)
        } else {
            lock.try_read_owned().ok().map(HeldLock::Shared)
        };
        Ok(held.map(|held| MetadataLockGuard {
            tag,
            mode,
            _held: held,
        }))
    }

    pub async fn lock_relation(&self, table_id: TableId, mode: LockMode) -> Result<MetadataLockGuard> {
        self.acquire(LockTag::Relation(table_id), mode).await
    }

    pub async fn lock_relation_distribution_metadata(
        &self,
        table_id: TableId,
        mode: LockMode,
    ) -> Result<MetadataLockGuard> {
        self.acquire(LockTag::RelationDistribution(table_id), mode)
            .await
    }

    pub async fn lock_shard_distribution_metadata(
        &self,
        shard_id: ShardId,
        mode: LockMode,
    ) -> Result<MetadataLockGuard> {
        self.acquire(LockTag::ShardMetadata(shard_id), mode).await
    }

    /// Locks every shard in the list, in ascending shard id order.
    pub async fn lock_shard_list_metadata(
        &self,
        shard_ids: &[ShardId],
        mode: LockMode,
    ) -> Result<Vec<MetadataLockGuard>> {
        let mut ordered = shard_ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for shard_id in ordered {
            guards.push(self.lock_shard_distribution_metadata(shard_id, mode).await?);
        }
        Ok(guards)
    }

    async fn acquire_held(lock: Arc<AsyncRwLock<()>>, mode: LockMode) -> HeldLock {
        if mode.is_exclusive() {
            HeldLock::Exclusive(lock.write_owned().await)
        } else {
            HeldLock::Shared(lock.read_owned().await)
        }
    }

    fn lock_for(&self, tag: LockTag) -> Result<Arc<AsyncRwLock<()>>> {
        let mut locks = self.locks.lock()?;
        if locks.len() > PRUNE_THRESHOLD {
            // an entry nobody holds or waits on has a single reference
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(locks
            .entry(tag)
            .or_insert_with(|| Arc::new(AsyncRwLock::new(())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_modes_are_compatible() {
        let locks = LockManager::new();
        let tag = LockTag::ShardMetadata(1);
        let _first = locks.acquire(tag, LockMode::Share).await.unwrap();
        let second = locks.try_acquire(tag, LockMode::AccessShare).unwrap();
        assert!(second.is_some());
        assert!(locks.try_acquire(tag, LockMode::Exclusive).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exclusive_blocks_everything_until_dropped() {
        let locks = LockManager::new();
        let tag = LockTag::RelationDistribution(4);
        let guard = locks.acquire(tag, LockMode::Exclusive).await.unwrap();
        assert!(guard.is_exclusive_on(tag));
        assert!(locks.try_acquire(tag, LockMode::Share).unwrap().is_none());

        // other tags are independent
        assert!(
            locks
                .try_acquire(LockTag::Relation(4), LockMode::Exclusive)
                .unwrap()
                .is_some()
        );

        drop(guard);
        assert!(locks.try_acquire(tag, LockMode::Share).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let locks = LockManager::with_timeout(Some(Duration::from_millis(20)));
        let tag = LockTag::RelationDistribution(9);
        let _held = locks.acquire(tag, LockMode::Exclusive).await.unwrap();
        let err = locks.acquire(tag, LockMode::Exclusive).await.unwrap_err();
        assert!(matches!(err, DbError::LockError(_)));
    }

    #[tokio::test]
    async fn test_shard_list_locks_are_ordered_and_deduplicated() {
        let locks = LockManager::new();
        let guards = locks
            .lock_shard_list_metadata(&[30, 10, 20, 10], LockMode::Share)
            .await
            .unwrap();
        let tags: Vec<LockTag> = guards.iter().map(|guard| guard.tag()).collect();
        assert_eq!(
            tags,
            vec![
                LockTag::ShardMetadata(10),
                LockTag::ShardMetadata(20),
                LockTag::ShardMetadata(30),
            ]
        );
    }

    #[tokio::test]
    async fn test_unused_entries_are_pruned() {
        let locks = LockManager::new();
        for shard_id in 0..(PRUNE_THRESHOLD as u64 + 10) {
            let _guard = locks
                .lock_shard_distribution_metadata(shard_id, LockMode::Exclusive)
                .await
                .unwrap();
        }
        assert!(locks.locks.lock().unwrap().len() <= PRUNE_THRESHOLD + 1);
    }
}
