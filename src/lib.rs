// ============================================================================
// shardcoord library
// ============================================================================

pub mod cluster;
pub mod core;
pub mod creation;
pub mod ddl;
pub mod metadata;
pub mod partition;

// Re-export main types for convenience
pub use core::{
    DbError, DistributedTable, HashTokenRange, PartitionMethod, PlacementState, RelationKind,
    Result, SessionContext, ShardId, ShardInterval, ShardPlacement, TableId, WorkerNode,
};

pub use cluster::{
    ClusterMembership, ForeignConstraintCommand, InMemoryWorkerTransport, PlacementPlan,
    PlacementPlanner, PlacementPolicy, ShardDdlRequest, WorkerNodeSource, WorkerRoster,
    WorkerTransport,
};
pub use creation::{
    CancellationFlag, CleanupPolicy, ShardCreationConfig, ShardCreationOrchestrator,
    ShardCreationReport,
};
pub use ddl::{DdlSource, InMemoryDdlSource};
pub use metadata::{LockManager, LockMode, MetadataStore};
pub use partition::partition_hash_space;
