use super::transport::{ShardDdlRequest, WorkerTransport};
use crate::core::{DbError, Result, ShardId, WorkerNode};
use crate::ddl::{extend_inter_shard_ddl, extend_shard_ddl};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A shard relation materialized on a simulated worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryShardRelation {
    pub owner: String,
    /// DDL as applied on the worker, with shard names already extended.
    pub applied_commands: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct InMemoryWorker {
    relations: BTreeMap<String, InMemoryShardRelation>,
    failing: bool,
}

/// One call made through the transport, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateShardAttempt {
    pub node: WorkerNode,
    pub shard_id: ShardId,
    pub created: bool,
}

/// An in-memory implementation of `WorkerTransport` for tests and tooling.
///
/// Simulates workers by keeping their shard relations in a map. Workers can be
/// switched into a failing mode to exercise placement retries.
#[derive(Clone, Default)]
pub struct InMemoryWorkerTransport {
    workers: Arc<Mutex<HashMap<WorkerNode, InMemoryWorker>>>,
    attempts: Arc<Mutex<Vec<CreateShardAttempt>>>,
}

impl InMemoryWorkerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker so it can receive shard DDL.
    pub async fn register_worker(&self, node: WorkerNode) -> Result<()> {
        if node.host.trim().is_empty() {
            return Err(DbError::InvalidArgument(
                "worker host must not be empty".to_string(),
            ));
        }
        self.workers.lock().await.entry(node).or_default();
        Ok(())
    }

    /// Makes every subsequent `create_shard` on `node` report failure.
    pub async fn set_worker_failing(&self, node: &WorkerNode, failing: bool) -> Result<()> {
        let mut workers = self.workers.lock().await;
        let worker = workers.get_mut(node).ok_or_else(|| Self::not_registered(node))?;
        worker.failing = failing;
        Ok(())
    }

    /// Names of the shard relations present on `node`, sorted.
    pub async fn shard_relations(&self, node: &WorkerNode) -> Result<Vec<String>> {
        let workers = self.workers.lock().await;
        let worker = workers.get(node).ok_or_else(|| Self::not_registered(node))?;
        Ok(worker.relations.keys().cloned().collect())
    }

    pub async fn relation(
        &self,
        node: &WorkerNode,
        relation_name: &str,
    ) -> Result<Option<InMemoryShardRelation>> {
        let workers = self.workers.lock().await;
        let worker = workers.get(node).ok_or_else(|| Self::not_registered(node))?;
        Ok(worker.relations.get(relation_name).cloned())
    }

    /// Every `create_shard` call made so far, in call order.
    pub async fn create_attempts(&self) -> Vec<CreateShardAttempt> {
        self.attempts.lock().await.clone()
    }

    fn not_registered(node: &WorkerNode) -> DbError {
        DbError::WorkerError(format!("worker '{}' is not registered", node))
    }

    fn apply_request(worker: &mut InMemoryWorker, request: &ShardDdlRequest) -> Result<bool> {
        let relation_name = request.shard_relation_name();
        if worker.relations.contains_key(&relation_name) {
            warn!("relation \"{}\" already exists", relation_name);
            return Ok(false);
        }

        let table_ddl = request
            .ddl_commands
            .iter()
            .map(|command| extend_shard_ddl(command, request.shard_id));
        let foreign_constraints = request.foreign_constraints.iter().map(|constraint| {
            extend_inter_shard_ddl(
                &constraint.command,
                request.shard_id,
                constraint.referenced_shard_id,
            )
        });

        let mut applied_commands = Vec::new();
        for extended in table_ddl.chain(foreign_constraints) {
            match extended {
                Ok(extended) => applied_commands.extend(extended),
                Err(err) => {
                    warn!(
                        "could not apply DDL for shard {}: {}",
                        request.shard_id, err
                    );
                    return Ok(false);
                }
            }
        }

        worker.relations.insert(
            relation_name,
            InMemoryShardRelation {
                owner: request.owner.clone(),
                applied_commands,
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl WorkerTransport for InMemoryWorkerTransport {
    async fn create_shard(&self, node: &WorkerNode, request: &ShardDdlRequest) -> Result<bool> {
        let outcome = {
            let mut workers = self.workers.lock().await;
            match workers.get_mut(node) {
                None => Err(Self::not_registered(node)),
                Some(worker) if worker.failing => {
                    warn!("worker {} rejected shard {}", node, request.shard_id);
                    Ok(false)
                }
                Some(worker) => Self::apply_request(worker, request),
            }
        };

        self.attempts.lock().await.push(CreateShardAttempt {
            node: node.clone(),
            shard_id: request.shard_id,
            created: matches!(outcome, Ok(true)),
        });
        if matches!(outcome, Ok(true)) {
            debug!("created shard relation {} on {}", request.shard_relation_name(), node);
        }
        outcome
    }

    async fn drop_shard(&self, node: &WorkerNode, request: &ShardDdlRequest) -> Result<()> {
        let mut workers = self.workers.lock().await;
        let worker = workers.get_mut(node).ok_or_else(|| Self::not_registered(node))?;
        worker.relations.remove(&request.shard_relation_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::transport::ForeignConstraintCommand;

    fn request(shard_id: ShardId) -> ShardDdlRequest {
        ShardDdlRequest {
            table_id: 1,
            relation_name: "events".to_string(),
            shard_id,
            shard_index: 0,
            owner: "alice".to_string(),
            ddl_commands: vec!["CREATE TABLE events (id BIGINT)".to_string()],
            foreign_constraints: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_drop_shard() {
        let transport = InMemoryWorkerTransport::new();
        let node = WorkerNode::new("worker-a", 5432);
        transport.register_worker(node.clone()).await.unwrap();

        assert!(transport.create_shard(&node, &request(10)).await.unwrap());
        assert_eq!(
            transport.shard_relations(&node).await.unwrap(),
            vec!["events_10".to_string()]
        );
        let relation = transport.relation(&node, "events_10").await.unwrap().unwrap();
        assert_eq!(relation.owner, "alice");
        assert!(relation.applied_commands[0].starts_with("CREATE TABLE events_10"));

        // second create of the same shard collides with the existing relation
        assert!(!transport.create_shard(&node, &request(10)).await.unwrap());

        transport.drop_shard(&node, &request(10)).await.unwrap();
        assert!(transport.shard_relations(&node).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_constraints_follow_table_ddl() {
        let transport = InMemoryWorkerTransport::new();
        let node = WorkerNode::new("worker-a", 5432);
        transport.register_worker(node.clone()).await.unwrap();

        let mut request = request(30);
        request.foreign_constraints.push(ForeignConstraintCommand {
            command: "ALTER TABLE events ADD CONSTRAINT events_parent_fk \
                      FOREIGN KEY (id) REFERENCES parents (id)"
                .to_string(),
            referenced_shard_id: 12,
        });
        assert!(transport.create_shard(&node, &request).await.unwrap());

        let relation = transport.relation(&node, "events_30").await.unwrap().unwrap();
        assert_eq!(relation.applied_commands.len(), 2);
        assert!(relation.applied_commands[1].starts_with("ALTER TABLE events_30"));
        assert!(relation.applied_commands[1].contains("REFERENCES parents_12"));
    }

    #[tokio::test]
    async fn test_failing_and_unknown_workers() {
        let transport = InMemoryWorkerTransport::new();
        let node = WorkerNode::new("worker-a", 5432);
        transport.register_worker(node.clone()).await.unwrap();
        transport.set_worker_failing(&node, true).await.unwrap();

        assert!(!transport.create_shard(&node, &request(1)).await.unwrap());
        let unknown = WorkerNode::new("worker-z", 5432);
        assert!(transport.create_shard(&unknown, &request(1)).await.is_err());

        let attempts = transport.create_attempts().await;
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|attempt| !attempt.created));
    }
}
