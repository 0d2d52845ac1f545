use super::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TableId = u32;
pub type ShardId = u64;
pub type PlacementId = u64;

/// How rows of a distributed table are assigned to shards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PartitionMethod {
    Hash,
    Range,
    Append,
    Reference,
}

impl PartitionMethod {
    /// Single-character code used in catalog rows.
    pub fn code(&self) -> char {
        match self {
            PartitionMethod::Hash => 'h',
            PartitionMethod::Range => 'r',
            PartitionMethod::Append => 'a',
            PartitionMethod::Reference => 'n',
        }
    }
}

impl fmt::Display for PartitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Physical kind of the relation a distributed table is backed by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RelationKind {
    #[default]
    Table,
    ForeignTable,
    ColumnarForeignTable,
}

impl RelationKind {
    pub fn shard_storage_type(&self) -> ShardStorageType {
        match self {
            RelationKind::Table => ShardStorageType::Table,
            RelationKind::ForeignTable => ShardStorageType::Foreign,
            RelationKind::ColumnarForeignTable => ShardStorageType::Columnar,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShardStorageType {
    Table,
    Foreign,
    Columnar,
}

impl ShardStorageType {
    pub fn code(&self) -> char {
        match self {
            ShardStorageType::Table => 't',
            ShardStorageType::Foreign => 'f',
            ShardStorageType::Columnar => 'c',
        }
    }
}

/// A logical table registered for distribution.
///
/// Registration happens outside the shard creation path; here the table is
/// read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributedTable {
    pub table_id: TableId,
    pub name: String,
    pub partition_method: PartitionMethod,
    pub owner: String,
    #[serde(default)]
    pub relation_kind: RelationKind,
}

impl DistributedTable {
    pub fn new(
        table_id: TableId,
        name: impl Into<String>,
        partition_method: PartitionMethod,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            table_id,
            name: name.into(),
            partition_method,
            owner: owner.into(),
            relation_kind: RelationKind::Table,
        }
    }

    pub fn with_relation_kind(mut self, relation_kind: RelationKind) -> Self {
        self.relation_kind = relation_kind;
        self
    }

    pub fn shard_storage_type(&self) -> ShardStorageType {
        self.relation_kind.shard_storage_type()
    }

    /// Fails unless the table is hash partitioned.
    pub fn ensure_hash_partitioned(&self) -> Result<()> {
        if self.partition_method != PartitionMethod::Hash {
            return Err(DbError::UnsupportedPartitionType(self.partition_method));
        }
        Ok(())
    }
}

/// Closed interval over the signed 32-bit hash token domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HashTokenRange {
    pub min: i32,
    pub max: i32,
}

impl HashTokenRange {
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min > max {
            return Err(DbError::InvalidArgument(format!(
                "hash token range min {} is greater than max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, token: i32) -> bool {
        self.min <= token && token <= self.max
    }

    /// Number of tokens covered, inclusive of both ends.
    pub fn token_count(&self) -> u64 {
        (self.max as i64 - self.min as i64 + 1) as u64
    }
}

impl fmt::Display for HashTokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardInterval {
    pub shard_id: ShardId,
    pub table_id: TableId,
    pub storage_type: ShardStorageType,
    /// `None` for reference-table shards, which cover the whole domain.
    pub range: Option<HashTokenRange>,
}

impl ShardInterval {
    /// Text form of the lower bound as stored in the shard catalog.
    pub fn min_value_text(&self) -> Option<String> {
        self.range.map(|range| range.min.to_string())
    }

    pub fn max_value_text(&self) -> Option<String> {
        self.range.map(|range| range.max.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlacementState {
    Finalized,
    Inactive,
    ToDelete,
}

impl PlacementState {
    /// Numeric code used in placement catalog rows.
    pub fn code(&self) -> u8 {
        match self {
            PlacementState::Finalized => 1,
            PlacementState::Inactive => 3,
            PlacementState::ToDelete => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardPlacement {
    pub placement_id: PlacementId,
    pub shard_id: ShardId,
    pub node: WorkerNode,
    pub state: PlacementState,
    pub shard_size: u64,
}

/// A worker addressed by host and port.
///
/// The derived ordering compares host first, then port, which is the order
/// placement decisions are made in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerNode {
    pub host: String,
    pub port: u16,
}

impl WorkerNode {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for WorkerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for WorkerNode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| DbError::ParseError(format!("expected host:port, got '{}'", s)))?;
        if host.is_empty() {
            return Err(DbError::ParseError(format!(
                "worker host must not be empty in '{}'",
                s
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| DbError::ParseError(format!("invalid port in '{}': {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}

/// Identity of the user running a shard creation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user: String,
    pub superuser: bool,
}

impl SessionContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            superuser: false,
        }
    }

    pub fn superuser(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            superuser: true,
        }
    }

    pub fn ensure_table_owner(&self, table: &DistributedTable) -> Result<()> {
        if self.superuser || self.user == table.owner {
            return Ok(());
        }
        Err(DbError::PermissionDenied {
            table: table.name.clone(),
            user: self.user.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_node_order_is_host_then_port() {
        let mut nodes = vec![
            WorkerNode::new("worker-b", 5432),
            WorkerNode::new("worker-a", 5433),
            WorkerNode::new("worker-a", 5432),
        ];
        nodes.sort();
        assert_eq!(
            nodes,
            vec![
                WorkerNode::new("worker-a", 5432),
                WorkerNode::new("worker-a", 5433),
                WorkerNode::new("worker-b", 5432),
            ]
        );
    }

    #[test]
    fn test_worker_node_parse() {
        let node: WorkerNode = "10.0.0.7:9700".parse().unwrap();
        assert_eq!(node, WorkerNode::new("10.0.0.7", 9700));
        assert_eq!(node.to_string(), "10.0.0.7:9700");

        assert!("no-port".parse::<WorkerNode>().is_err());
        assert!(":5432".parse::<WorkerNode>().is_err());
        assert!("host:notaport".parse::<WorkerNode>().is_err());
    }

    #[test]
    fn test_hash_token_range() {
        let range = HashTokenRange::new(-10, 10).unwrap();
        assert!(range.contains(0));
        assert!(!range.contains(11));
        assert_eq!(range.token_count(), 21);

        let full = HashTokenRange::new(i32::MIN, i32::MAX).unwrap();
        assert_eq!(full.token_count(), 1u64 << 32);

        assert!(HashTokenRange::new(5, 4).is_err());
    }

    #[test]
    fn test_table_owner_check() {
        let table = DistributedTable::new(1, "events", PartitionMethod::Hash, "alice");
        assert!(SessionContext::new("alice").ensure_table_owner(&table).is_ok());
        assert!(SessionContext::superuser("postgres")
            .ensure_table_owner(&table)
            .is_ok());
        let err = SessionContext::new("bob")
            .ensure_table_owner(&table)
            .unwrap_err();
        assert!(matches!(err, DbError::PermissionDenied { .. }));
    }

    #[test]
    fn test_storage_type_follows_relation_kind() {
        let table = DistributedTable::new(1, "logs", PartitionMethod::Hash, "alice")
            .with_relation_kind(RelationKind::ColumnarForeignTable);
        assert_eq!(table.shard_storage_type().code(), 'c');
        assert_eq!(RelationKind::Table.shard_storage_type().code(), 't');
    }
}
