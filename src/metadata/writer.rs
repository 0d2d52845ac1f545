use super::locks::{LockTag, MetadataLockGuard};
use super::store::MetadataStore;
use crate::core::{
    DbError, PlacementState, Result, ShardInterval, ShardPlacement, TableId, WorkerNode,
};
use std::sync::Arc;

/// A placement row that has not been assigned a placement id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlacement {
    pub node: WorkerNode,
    pub state: PlacementState,
    pub shard_size: u64,
}

/// A shard whose rows are visible in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedShard {
    pub interval: ShardInterval,
    pub placements: Vec<ShardPlacement>,
}

/// Entry point for shard metadata writes.
///
/// Rows are staged per shard and become visible in one step on commit.
/// Staging a shard requires the caller to hold the shard's exclusive
/// metadata lock for as long as the staged shard lives.
#[derive(Clone)]
pub struct MetadataWriter {
    store: Arc<MetadataStore>,
}

impl MetadataWriter {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    /// Stages the shard row for `interval`.
    pub fn insert_shard<'a>(
        &'a self,
        interval: ShardInterval,
        shard_lock: &'a MetadataLockGuard,
    ) -> Result<PendingShard<'a>> {
        let tag = LockTag::ShardMetadata(interval.shard_id);
        if !shard_lock.is_exclusive_on(tag) {
            return Err(DbError::LockError(format!(
                "writing shard {} requires an exclusive lock on {:?}, caller holds {:?} on {:?}",
                interval.shard_id,
                tag,
                shard_lock.mode(),
                shard_lock.tag()
            )));
        }
        Ok(PendingShard {
            store: &self.store,
            _shard_lock: shard_lock,
            interval,
            placements: Vec::new(),
        })
    }

    pub fn list_shards(&self, table_id: TableId) -> Result<Vec<ShardInterval>> {
        self.store.load_shard_interval_list(table_id)
    }
}

/// Shard and placement rows waiting to be committed.
///
/// Dropping a pending shard without committing discards its rows.
pub struct PendingShard<'a> {
    store: &'a MetadataStore,
    _shard_lock: &'a MetadataLockGuard,
    interval: ShardInterval,
    placements: Vec<NewPlacement>,
}

impl PendingShard<'_> {
    pub fn interval(&self) -> &ShardInterval {
        &self.interval
    }

    pub fn insert_placement(&mut self, node: WorkerNode, state: PlacementState, shard_size: u64) {
        self.placements.push(NewPlacement {
            node,
            state,
            shard_size,
        });
    }

    pub fn commit(self) -> Result<CommittedShard> {
        let placements = self
            .store
            .commit_shard(self.interval.clone(), self.placements)?;
        Ok(CommittedShard {
            interval: self.interval,
            placements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DistributedTable, HashTokenRange, PartitionMethod, ShardStorageType};
    use crate::metadata::{LockManager, LockMode};

    fn setup() -> (MetadataWriter, LockManager) {
        let store = Arc::new(MetadataStore::new());
        store
            .register_table(DistributedTable::new(
                1,
                "events",
                PartitionMethod::Hash,
                "alice",
            ))
            .unwrap();
        (MetadataWriter::new(store), LockManager::new())
    }

    fn interval(shard_id: u64) -> ShardInterval {
        ShardInterval {
            shard_id,
            table_id: 1,
            storage_type: ShardStorageType::Table,
            range: Some(HashTokenRange {
                min: i32::MIN,
                max: i32::MAX,
            }),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_shard_visible() {
        let (writer, locks) = setup();
        let guard = locks
            .lock_shard_distribution_metadata(5, LockMode::Exclusive)
            .await
            .unwrap();

        let mut pending = writer.insert_shard(interval(5), &guard).unwrap();
        pending.insert_placement(WorkerNode::new("worker-a", 5432), PlacementState::Finalized, 0);
        assert!(writer.list_shards(1).unwrap().is_empty());

        let committed = pending.commit().unwrap();
        assert_eq!(committed.placements.len(), 1);
        assert_eq!(writer.list_shards(1).unwrap(), vec![interval(5)]);
    }

    #[tokio::test]
    async fn test_dropped_pending_shard_leaves_no_rows() {
        let (writer, locks) = setup();
        let guard = locks
            .lock_shard_distribution_metadata(5, LockMode::Exclusive)
            .await
            .unwrap();
        {
            let mut pending = writer.insert_shard(interval(5), &guard).unwrap();
            pending.insert_placement(
                WorkerNode::new("worker-a", 5432),
                PlacementState::Finalized,
                0,
            );
        }
        assert!(writer.list_shards(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_requires_exclusive_shard_lock() {
        let (writer, locks) = setup();
        let shared = locks
            .lock_shard_distribution_metadata(5, LockMode::Share)
            .await
            .unwrap();
        assert!(matches!(
            writer.insert_shard(interval(5), &shared),
            Err(DbError::LockError(_))
        ));

        let other_shard = locks
            .lock_shard_distribution_metadata(6, LockMode::Exclusive)
            .await
            .unwrap();
        assert!(matches!(
            writer.insert_shard(interval(5), &other_shard),
            Err(DbError::LockError(_))
        ));
    }

    #[test]
    fn test_shard_lock_is_free_after_commit() {
        let (writer, locks) = setup();
        tokio_test::block_on(async {
            let guard = locks
                .lock_shard_distribution_metadata(7, LockMode::Exclusive)
                .await
                .unwrap();
            let mut pending = writer.insert_shard(interval(7), &guard).unwrap();
            pending.insert_placement(
                WorkerNode::new("worker-a", 5432),
                PlacementState::Finalized,
                0,
            );
            pending.commit().unwrap();
            assert!(locks
                .try_acquire(LockTag::ShardMetadata(7), LockMode::Share)
                .unwrap()
                .is_none());
            drop(guard);
        });
        assert!(locks
            .try_acquire(LockTag::ShardMetadata(7), LockMode::Exclusive)
            .unwrap()
            .is_some());
    }
}
