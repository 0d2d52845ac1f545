use crate::core::{DbError, Result, ShardId, TableId, WorkerNode};
use crate::ddl::shard_relation_name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a worker needs to materialize one shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardDdlRequest {
    pub table_id: TableId,
    /// Name of the logical relation; the worker appends the shard id.
    pub relation_name: String,
    pub shard_id: ShardId,
    /// Position of the shard within its table's shard list.
    pub shard_index: usize,
    pub owner: String,
    pub ddl_commands: Vec<String>,
    /// Applied after `ddl_commands`, each against its referenced shard.
    #[serde(default)]
    pub foreign_constraints: Vec<ForeignConstraintCommand>,
}

/// A foreign key command bound to the shard it references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignConstraintCommand {
    pub command: String,
    pub referenced_shard_id: ShardId,
}

impl ShardDdlRequest {
    pub fn shard_relation_name(&self) -> String {
        shard_relation_name(&self.relation_name, self.shard_id)
    }
}

/// Capability to run shard DDL on workers.
///
/// Implementations own the wire protocol; the creation path only needs to
/// know whether a shard was fully materialized on a node.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Replays the request's DDL on `node` under the request's owner.
    ///
    /// `Ok(false)` means the worker rejected the DDL. `Err` means the worker
    /// could not be reached; callers treat both as a failed placement.
    async fn create_shard(&self, node: &WorkerNode, request: &ShardDdlRequest) -> Result<bool>;

    /// Drops a shard relation created by an earlier `create_shard`.
    async fn drop_shard(&self, node: &WorkerNode, request: &ShardDdlRequest) -> Result<()> {
        Err(DbError::UnsupportedOperation(format!(
            "transport cannot drop shard relation {} on {}",
            request.shard_relation_name(),
            node
        )))
    }
}
