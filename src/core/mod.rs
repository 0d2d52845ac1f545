pub mod error;
pub mod types;

pub use error::{DbError, Result};
pub use types::{
    DistributedTable, HashTokenRange, PartitionMethod, PlacementId, PlacementState,
    RelationKind, SessionContext, ShardId, ShardInterval, ShardPlacement, ShardStorageType,
    TableId, WorkerNode,
};
