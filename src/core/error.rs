use crate::core::types::{PartitionMethod, ShardId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("must be owner of table {table} (current user '{user}')")]
    PermissionDenied { table: String, user: String },

    #[error("table \"{0}\" has already had shards created for it")]
    AlreadySharded(String),

    #[error("unsupported table partition type: {0}")]
    UnsupportedPartitionType(PartitionMethod),

    #[error(
        "replication_factor ({replication_factor}) exceeds number of worker nodes ({worker_count})"
    )]
    InsufficientWorkers {
        replication_factor: usize,
        worker_count: usize,
    },

    #[error("could only create {created} of {required} of required shard replicas for shard {shard_id}")]
    PlacementFailed {
        shard_id: ShardId,
        created: usize,
        required: usize,
    },

    #[error("table \"{target}\" could not be colocated with {source_table}")]
    ColocationFailed {
        target: String,
        source_table: String,
    },

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Shard {0} not found")]
    ShardNotFound(ShardId),

    #[error("canceling statement due to user request")]
    Cancelled,

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
