use super::writer::NewPlacement;
use crate::core::{
    DbError, DistributedTable, PartitionMethod, PlacementId, Result, ShardId, ShardInterval,
    ShardPlacement, TableId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// First value handed out by the shard id sequence.
pub const FIRST_SHARD_ID: ShardId = 102008;
pub const FIRST_PLACEMENT_ID: PlacementId = 1;

const METADATA_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct CatalogState {
    tables: BTreeMap<TableId, DistributedTable>,
    shards: BTreeMap<ShardId, ShardInterval>,
    placements: BTreeMap<ShardId, Vec<ShardPlacement>>,
}

/// Serialized form of the whole catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataSnapshot {
    pub version: u32,
    pub tables: Vec<DistributedTable>,
    pub shards: Vec<ShardInterval>,
    pub placements: Vec<ShardPlacement>,
    pub next_shard_id: ShardId,
    pub next_placement_id: PlacementId,
}

/// Catalog of distributed tables, their shards and shard placements.
///
/// A shard row and its placement rows are written under one catalog write
/// lock, so readers see either a shard with all of its placements or no
/// shard at all.
pub struct MetadataStore {
    state: RwLock<CatalogState>,
    next_shard_id: AtomicU64,
    next_placement_id: AtomicU64,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            next_shard_id: AtomicU64::new(FIRST_SHARD_ID),
            next_placement_id: AtomicU64::new(FIRST_PLACEMENT_ID),
        }
    }

    /// Records a table as distributed. Ids and names must be unique.
    pub fn register_table(&self, table: DistributedTable) -> Result<()> {
        if table.name.trim().is_empty() {
            return Err(DbError::InvalidArgument(
                "table name must not be empty".to_string(),
            ));
        }
        let mut state = self.state.write()?;
        if state.tables.contains_key(&table.table_id) {
            return Err(DbError::InvalidArgument(format!(
                "table id {} is already registered",
                table.table_id
            )));
        }
        if state.tables.values().any(|existing| existing.name == table.name) {
            return Err(DbError::InvalidArgument(format!(
                "table \"{}\" is already registered",
                table.name
            )));
        }
        state.tables.insert(table.table_id, table);
        Ok(())
    }

    pub fn table(&self, table_id: TableId) -> Result<DistributedTable> {
        self.state
            .read()?
            .tables
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(format!("ID: {}", table_id)))
    }

    pub fn resolve_table(&self, name: &str) -> Result<DistributedTable> {
        self.state
            .read()?
            .tables
            .values()
            .find(|table| table.name == name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Allocates a new shard id. Ids are never reused.
    pub fn next_shard_id(&self) -> ShardId {
        self.next_shard_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Shard ids of a table, in shard interval order.
    pub fn load_shard_list(&self, table_id: TableId) -> Result<Vec<ShardId>> {
        Ok(self
            .load_shard_interval_list(table_id)?
            .into_iter()
            .map(|interval| interval.shard_id)
            .collect())
    }

    /// Shard intervals of a table sorted by range lower bound.
    ///
    /// Unbounded intervals sort first; ties break on shard id.
    pub fn load_shard_interval_list(&self, table_id: TableId) -> Result<Vec<ShardInterval>> {
        let state = self.state.read()?;
        let mut intervals = state
            .shards
            .values()
            .filter(|interval| interval.table_id == table_id)
            .cloned()
            .collect::<Vec<_>>();
        intervals.sort_by_key(|interval| (interval.range.map(|range| range.min), interval.shard_id));
        Ok(intervals)
    }

    pub fn load_shard_interval(&self, shard_id: ShardId) -> Result<ShardInterval> {
        self.state
            .read()?
            .shards
            .get(&shard_id)
            .cloned()
            .ok_or(DbError::ShardNotFound(shard_id))
    }

    /// Placements of a shard in placement id order.
    pub fn shard_placement_list(&self, shard_id: ShardId) -> Result<Vec<ShardPlacement>> {
        let state = self.state.read()?;
        if !state.shards.contains_key(&shard_id) {
            return Err(DbError::ShardNotFound(shard_id));
        }
        Ok(state.placements.get(&shard_id).cloned().unwrap_or_default())
    }

    /// Position of a shard within its table's interval list.
    pub fn shard_index(&self, shard_id: ShardId) -> Result<usize> {
        let interval = self.load_shard_interval(shard_id)?;
        self.load_shard_list(interval.table_id)?
            .iter()
            .position(|id| *id == shard_id)
            .ok_or(DbError::ShardNotFound(shard_id))
    }

    /// Inserts a shard row together with its placement rows.
    pub(crate) fn commit_shard(
        &self,
        interval: ShardInterval,
        placements: Vec<NewPlacement>,
    ) -> Result<Vec<ShardPlacement>> {
        if placements.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "shard {} must have at least one placement",
                interval.shard_id
            )));
        }
        let mut nodes = HashSet::new();
        for placement in &placements {
            if !nodes.insert(&placement.node) {
                return Err(DbError::InvalidArgument(format!(
                    "shard {} has more than one placement on {}",
                    interval.shard_id, placement.node
                )));
            }
        }

        let mut state = self.state.write()?;
        let table = state
            .tables
            .get(&interval.table_id)
            .ok_or_else(|| DbError::TableNotFound(format!("ID: {}", interval.table_id)))?;
        if state.shards.contains_key(&interval.shard_id) {
            return Err(DbError::InvalidArgument(format!(
                "shard {} already exists",
                interval.shard_id
            )));
        }
        Self::validate_interval(table, &interval, &state)?;

        let rows = placements
            .into_iter()
            .map(|placement| ShardPlacement {
                placement_id: self.next_placement_id.fetch_add(1, Ordering::SeqCst),
                shard_id: interval.shard_id,
                node: placement.node,
                state: placement.state,
                shard_size: placement.shard_size,
            })
            .collect::<Vec<_>>();

        state.placements.insert(interval.shard_id, rows.clone());
        state.shards.insert(interval.shard_id, interval);
        Ok(rows)
    }

    fn validate_interval(
        table: &DistributedTable,
        interval: &ShardInterval,
        state: &CatalogState,
    ) -> Result<()> {
        match (table.partition_method, interval.range) {
            (PartitionMethod::Reference, Some(_)) => {
                return Err(DbError::InvalidArgument(format!(
                    "reference table \"{}\" shards cannot have a hash range",
                    table.name
                )));
            }
            (PartitionMethod::Hash, None) => {
                return Err(DbError::InvalidArgument(format!(
                    "hash distributed table \"{}\" shards need a hash range",
                    table.name
                )));
            }
            _ => {}
        }

        let Some(range) = interval.range else {
            return Ok(());
        };
        let overlapping = state.shards.values().find(|existing| {
            existing.table_id == interval.table_id
                && existing
                    .range
                    .is_some_and(|other| other.min <= range.max && range.min <= other.max)
        });
        if let Some(existing) = overlapping {
            return Err(DbError::InvalidArgument(format!(
                "shard range {} overlaps shard {} of table \"{}\"",
                range, existing.shard_id, table.name
            )));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<MetadataSnapshot> {
        let state = self.state.read()?;
        Ok(MetadataSnapshot {
            version: METADATA_SNAPSHOT_VERSION,
            tables: state.tables.values().cloned().collect(),
            shards: state.shards.values().cloned().collect(),
            placements: state.placements.values().flatten().cloned().collect(),
            next_shard_id: self.next_shard_id.load(Ordering::SeqCst),
            next_placement_id: self.next_placement_id.load(Ordering::SeqCst),
        })
    }

    pub fn from_snapshot(snapshot: MetadataSnapshot) -> Result<Self> {
        if snapshot.version != METADATA_SNAPSHOT_VERSION {
            return Err(DbError::SerializationError(format!(
                "unsupported metadata snapshot version {}",
                snapshot.version
            )));
        }

        let mut state = CatalogState::default();
        for table in snapshot.tables {
            state.tables.insert(table.table_id, table);
        }
        for shard in snapshot.shards {
            if !state.tables.contains_key(&shard.table_id) {
                return Err(DbError::TableNotFound(format!("ID: {}", shard.table_id)));
            }
            state.shards.insert(shard.shard_id, shard);
        }
        for placement in snapshot.placements {
            if !state.shards.contains_key(&placement.shard_id) {
                return Err(DbError::ShardNotFound(placement.shard_id));
            }
            state
                .placements
                .entry(placement.shard_id)
                .or_default()
                .push(placement);
        }
        for placements in state.placements.values_mut() {
            placements.sort_by_key(|placement| placement.placement_id);
        }

        Ok(Self {
            state: RwLock::new(state),
            next_shard_id: AtomicU64::new(snapshot.next_shard_id.max(FIRST_SHARD_ID)),
            next_placement_id: AtomicU64::new(
                snapshot.next_placement_id.max(FIRST_PLACEMENT_ID),
            ),
        })
    }

    /// Writes the catalog as JSON, replacing `path` atomically.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.snapshot()?)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let snapshot: MetadataSnapshot = serde_json::from_slice(&bytes)?;
        Self::from_snapshot(snapshot)
    }
}
