//! Shard metadata: the catalog of shards and placements, the locks that
//! serialize changes to it, and the writer the creation path goes through.

pub mod locks;
pub mod store;
pub mod writer;

pub use locks::{LockManager, LockMode, LockTag, MetadataLockGuard};
pub use store::{FIRST_PLACEMENT_ID, FIRST_SHARD_ID, MetadataSnapshot, MetadataStore};
pub use writer::{CommittedShard, MetadataWriter, NewPlacement, PendingShard};
