use crate::core::{DbError, Result, WorkerNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

pub mod in_memory_transport;
pub mod transport;

pub use in_memory_transport::InMemoryWorkerTransport;
pub use transport::{ForeignConstraintCommand, ShardDdlRequest, WorkerTransport};

// Worker-side concerns are split by responsibility: who is in the cluster,
// how a snapshot of them is ordered, and how replicas are assigned.
include!("cluster/membership.rs");
include!("cluster/roster.rs");
include!("cluster/planner.rs");
