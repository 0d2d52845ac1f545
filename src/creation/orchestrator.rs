use super::cancel::CancellationFlag;
use super::config::ShardCreationConfig;
use super::creator::{EMPTY_SHARD_SIZE, ShardPhysicalCreator};
use crate::cluster::{
    ForeignConstraintCommand, PlacementPlan, PlacementPlanner, ShardDdlRequest, WorkerNodeSource,
    WorkerRoster, WorkerTransport,
};
use crate::core::{
    DbError, DistributedTable, PartitionMethod, PlacementState, Result, SessionContext, ShardId,
    ShardInterval, TableId, WorkerNode,
};
use crate::ddl::{DdlSource, foreign_key_referenced_relation};
use crate::metadata::{CommittedShard, LockManager, LockMode, MetadataStore, MetadataWriter};
use crate::partition::partition_hash_space;
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

// One file per creation use case; all of them share the helpers below.
include!("orchestrator/round_robin.rs");
include!("orchestrator/colocated.rs");
include!("orchestrator/reference.rs");

/// Outcome of one shard creation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardCreationReport {
    pub table_id: TableId,
    pub shards: Vec<ReportedShard>,
    /// A cancel request arrived while shards were being created and was not
    /// acted upon.
    pub cancel_ignored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedShard {
    pub shard_id: ShardId,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub nodes: Vec<WorkerNode>,
}

impl ShardCreationReport {
    fn new(table_id: TableId, shards: &[CommittedShard], cancel_ignored: bool) -> Self {
        let shards = shards
            .iter()
            .map(|shard| ReportedShard {
                shard_id: shard.interval.shard_id,
                min_value: shard.interval.min_value_text(),
                max_value: shard.interval.max_value_text(),
                nodes: shard.placements.iter().map(|p| p.node.clone()).collect(),
            })
            .collect();
        Self {
            table_id,
            shards,
            cancel_ignored,
        }
    }

    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.shards.iter().map(|shard| shard.shard_id).collect()
    }

    pub fn placement_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.nodes.len()).sum()
    }
}

/// DDL replayed on every shard of one table.
struct TableDdl {
    commands: Vec<String>,
    foreign_constraints: Vec<ForeignConstraintPlan>,
}

/// A foreign key command and the shards of the table it references.
struct ForeignConstraintPlan {
    command: String,
    referenced: ReferencedShards,
}

enum ReferencedShards {
    /// The table references itself.
    SameShard,
    /// Reference table: every shard points at its one shard.
    Single(ShardId),
    /// Hash table with one shard per shard index.
    Colocated(Vec<ShardId>),
}

impl TableDdl {
    fn shard_request(
        &self,
        table: &DistributedTable,
        shard_id: ShardId,
        shard_index: usize,
    ) -> Result<ShardDdlRequest> {
        let foreign_constraints = self
            .foreign_constraints
            .iter()
            .map(|plan| {
                let referenced_shard_id = match &plan.referenced {
                    ReferencedShards::SameShard => shard_id,
                    ReferencedShards::Single(referenced) => *referenced,
                    ReferencedShards::Colocated(shards) => {
                        *shards.get(shard_index).ok_or_else(|| {
                            DbError::InvalidArgument(format!(
                                "referenced table has no shard at index {}",
                                shard_index
                            ))
                        })?
                    }
                };
                Ok(ForeignConstraintCommand {
                    command: plan.command.clone(),
                    referenced_shard_id,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ShardDdlRequest {
            table_id: table.table_id,
            relation_name: table.name.clone(),
            shard_id,
            shard_index,
            owner: table.owner.clone(),
            ddl_commands: self.commands.clone(),
            foreign_constraints,
        })
    }
}

/// Entry point for creating the shards of a distributed table.
///
/// Every operation is all or nothing per shard: a shard either has its
/// shard row and all placement rows committed, or leaves no catalog trace.
/// Shards committed before a failure stay committed.
pub struct ShardCreationOrchestrator {
    store: Arc<MetadataStore>,
    writer: MetadataWriter,
    locks: Arc<LockManager>,
    workers: Arc<dyn WorkerNodeSource>,
    ddl_source: Arc<dyn DdlSource>,
    creator: ShardPhysicalCreator,
    planner: PlacementPlanner,
    config: ShardCreationConfig,
    cancel: CancellationFlag,
}

impl ShardCreationOrchestrator {
    pub fn new(
        store: Arc<MetadataStore>,
        workers: Arc<dyn WorkerNodeSource>,
        transport: Arc<dyn WorkerTransport>,
        ddl_source: Arc<dyn DdlSource>,
        config: ShardCreationConfig,
    ) -> Self {
        Self {
            writer: MetadataWriter::new(store.clone()),
            store,
            locks: Arc::new(LockManager::with_timeout(config.lock_timeout)),
            workers,
            ddl_source,
            creator: ShardPhysicalCreator::new(transport, config.cleanup_policy),
            planner: PlacementPlanner::new(config.placement_policy),
            config,
            cancel: CancellationFlag::new(),
        }
    }

    /// Shares a lock manager with other orchestrators over the same store.
    pub fn with_lock_manager(mut self, locks: Arc<LockManager>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn config(&self) -> &ShardCreationConfig {
        &self.config
    }

    /// Handle for requesting cancellation of this orchestrator's operations.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    fn ensure_no_shards(&self, table: &DistributedTable) -> Result<()> {
        if !self.store.load_shard_list(table.table_id)?.is_empty() {
            return Err(DbError::AlreadySharded(table.name.clone()));
        }
        Ok(())
    }

    /// Loads the table DDL and binds each foreign key command to the shards
    /// of its referenced table.
    ///
    /// A referenced hash table must already have `shard_count` shards, so
    /// shard `i` of `table` can point at shard `i` of the referenced table.
    fn load_table_ddl(&self, table: &DistributedTable, shard_count: usize) -> Result<TableDdl> {
        let commands = self.ddl_source.table_ddl_events(table)?;
        let mut foreign_constraints = Vec::new();
        for command in self.ddl_source.foreign_constraint_commands(table)? {
            let referenced = self
                .store
                .resolve_table(&foreign_key_referenced_relation(&command)?)?;
            let referenced_shards = if referenced.table_id == table.table_id {
                ReferencedShards::SameShard
            } else {
                let shard_ids = self.store.load_shard_list(referenced.table_id)?;
                match (table.partition_method, referenced.partition_method) {
                    (_, PartitionMethod::Reference) if shard_ids.len() == 1 => {
                        ReferencedShards::Single(shard_ids[0])
                    }
                    (PartitionMethod::Hash, PartitionMethod::Hash)
                        if shard_ids.len() == shard_count =>
                    {
                        ReferencedShards::Colocated(shard_ids)
                    }
                    _ => {
                        return Err(DbError::InvalidArgument(format!(
                            "foreign key from \"{}\" references \"{}\", which is not colocated with it",
                            table.name, referenced.name
                        )));
                    }
                }
            };
            foreign_constraints.push(ForeignConstraintPlan {
                command,
                referenced: referenced_shards,
            });
        }
        Ok(TableDdl {
            commands,
            foreign_constraints,
        })
    }

    /// Creates one shard per `plan` and commits it with its placements.
    async fn create_planned_shard(
        &self,
        table: &DistributedTable,
        interval: ShardInterval,
        ddl: &TableDdl,
        roster: &WorkerRoster,
        plan: PlacementPlan,
    ) -> Result<CommittedShard> {
        let shard_lock = self
            .locks
            .lock_shard_distribution_metadata(interval.shard_id, LockMode::Exclusive)
            .await?;
        let request = ddl.shard_request(table, interval.shard_id, plan.shard_index)?;
        let replicas = self.creator.create_replicas(&request, roster, &plan).await?;
        let nodes: Vec<WorkerNode> = replicas.iter().map(|r| r.node.clone()).collect();

        let mut pending = self.writer.insert_shard(interval, &shard_lock)?;
        for replica in replicas {
            pending.insert_placement(replica.node, PlacementState::Finalized, replica.shard_size);
        }
        match pending.commit() {
            Ok(committed) => Ok(committed),
            Err(err) => {
                self.creator.compensate(&request, &nodes).await;
                Err(err)
            }
        }
    }
}
