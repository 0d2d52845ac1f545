//! Shard creation use cases and the machinery they share.

pub mod cancel;
pub mod config;
pub mod creator;
pub mod orchestrator;

pub use cancel::{CancelHoldGuard, CancellationFlag};
pub use config::{CleanupPolicy, ShardCreationConfig};
pub use creator::{CreatedReplica, EMPTY_SHARD_SIZE, ShardPhysicalCreator};
pub use orchestrator::{ReportedShard, ShardCreationOrchestrator, ShardCreationReport};
