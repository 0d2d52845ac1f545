use super::config::CleanupPolicy;
use crate::cluster::{PlacementPlan, ShardDdlRequest, WorkerRoster, WorkerTransport};
use crate::core::{DbError, Result, WorkerNode};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{Level, event};

/// Size recorded for a freshly created, empty shard.
pub const EMPTY_SHARD_SIZE: u64 = 0;

/// A shard relation that now exists on a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedReplica {
    pub node: WorkerNode,
    pub shard_size: u64,
}

/// Materializes shard relations on workers.
///
/// Worker failures are absorbed here: a node that rejects the DDL or cannot
/// be reached is skipped, and only running out of candidates is an error.
#[derive(Clone)]
pub struct ShardPhysicalCreator {
    transport: Arc<dyn WorkerTransport>,
    cleanup_policy: CleanupPolicy,
}

impl ShardPhysicalCreator {
    pub fn new(transport: Arc<dyn WorkerTransport>, cleanup_policy: CleanupPolicy) -> Self {
        Self {
            transport,
            cleanup_policy,
        }
    }

    /// Walks the plan's candidates in order until `replication_factor`
    /// replicas exist or the candidates run out.
    ///
    /// Candidates are tried one at a time; no node is attempted twice for
    /// the same shard.
    pub async fn create_replicas(
        &self,
        request: &ShardDdlRequest,
        roster: &WorkerRoster,
        plan: &PlacementPlan,
    ) -> Result<Vec<CreatedReplica>> {
        let mut created = Vec::with_capacity(plan.replication_factor);
        for node in plan.candidates(roster) {
            if created.len() >= plan.replication_factor {
                break;
            }
            if self.try_create(node, request).await {
                created.push(CreatedReplica {
                    node: node.clone(),
                    shard_size: EMPTY_SHARD_SIZE,
                });
            }
        }

        if created.len() < plan.replication_factor {
            let nodes: Vec<WorkerNode> = created.iter().map(|r| r.node.clone()).collect();
            self.compensate(request, &nodes).await;
            return Err(DbError::PlacementFailed {
                shard_id: request.shard_id,
                created: created.len(),
                required: plan.replication_factor,
            });
        }
        Ok(created)
    }

    /// Creates the shard on every node in `nodes` concurrently.
    ///
    /// Returns one outcome per node, in the order given.
    pub async fn create_on_nodes(
        &self,
        request: &ShardDdlRequest,
        nodes: &[WorkerNode],
    ) -> Vec<(WorkerNode, bool)> {
        let attempts = nodes.iter().map(|node| async move {
            let created = self.try_create(node, request).await;
            (node.clone(), created)
        });
        join_all(attempts).await
    }

    /// Deals with relations left on `nodes` by a shard that will not be
    /// committed.
    pub async fn compensate(&self, request: &ShardDdlRequest, nodes: &[WorkerNode]) {
        if nodes.is_empty() {
            return;
        }
        match self.cleanup_policy {
            CleanupPolicy::RetainOrphans => {
                let orphans: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
                event!(
                    Level::WARN,
                    shard_id = request.shard_id,
                    nodes = %orphans.join(", "),
                    "leaving orphaned shard relation {} on workers",
                    request.shard_relation_name()
                );
            }
            CleanupPolicy::DropCreated => {
                for node in nodes {
                    if let Err(err) = self.transport.drop_shard(node, request).await {
                        event!(
                            Level::WARN,
                            shard_id = request.shard_id,
                            node = %node,
                            error = %err,
                            "could not drop orphaned shard relation"
                        );
                    }
                }
            }
        }
    }

    async fn try_create(&self, node: &WorkerNode, request: &ShardDdlRequest) -> bool {
        match self.transport.create_shard(node, request).await {
            Ok(true) => {
                event!(
                    Level::DEBUG,
                    shard_id = request.shard_id,
                    node = %node,
                    "created shard relation"
                );
                true
            }
            Ok(false) => {
                event!(
                    Level::WARN,
                    shard_id = request.shard_id,
                    node = %node,
                    "could not create shard on {}",
                    node
                );
                false
            }
            Err(err) => {
                event!(
                    Level::WARN,
                    shard_id = request.shard_id,
                    node = %node,
                    error = %err,
                    "could not connect to {} to create shard",
                    node
                );
                false
            }
        }
    }
}
