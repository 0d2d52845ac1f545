/// Whether a registered worker may receive new shard placements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerNodeState {
    Active,
    Inactive,
}

/// Source of the workers that are eligible for shard placement.
pub trait WorkerNodeSource: Send + Sync {
    /// Returns the currently active workers in no particular order.
    fn active_worker_nodes(&self) -> Result<Vec<WorkerNode>>;
}

/// Maintains the set of workers known to the coordinator.
#[derive(Debug, Default)]
pub struct ClusterMembership {
    nodes: RwLock<HashMap<WorkerNode, WorkerNodeState>>,
}

impl ClusterMembership {
    /// Creates a membership registry with every given node active.
    pub fn new(nodes: Vec<WorkerNode>) -> Result<Self> {
        let membership = Self::default();
        for node in nodes {
            membership.add_node(node)?;
        }
        Ok(membership)
    }

    /// Registers a worker as active.
    pub fn add_node(&self, node: WorkerNode) -> Result<()> {
        if node.host.trim().is_empty() {
            return Err(DbError::InvalidArgument(
                "worker host must not be empty".to_string(),
            ));
        }
        if node.port == 0 {
            return Err(DbError::InvalidArgument(format!(
                "worker '{}' must have a non-zero port",
                node.host
            )));
        }
        self.nodes.write()?.insert(node, WorkerNodeState::Active);
        Ok(())
    }

    /// Removes a worker. Returns true if it was registered.
    pub fn remove_node(&self, node: &WorkerNode) -> Result<bool> {
        Ok(self.nodes.write()?.remove(node).is_some())
    }

    pub fn set_node_active(&self, node: &WorkerNode, active: bool) -> Result<()> {
        let mut nodes = self.nodes.write()?;
        let state = nodes.get_mut(node).ok_or_else(|| {
            DbError::WorkerError(format!("worker '{}' is not registered", node))
        })?;
        *state = if active {
            WorkerNodeState::Active
        } else {
            WorkerNodeState::Inactive
        };
        Ok(())
    }

    pub fn contains(&self, node: &WorkerNode) -> Result<bool> {
        Ok(self.nodes.read()?.contains_key(node))
    }

    /// Returns a sorted list of all registered workers, active or not.
    pub fn all_nodes(&self) -> Result<Vec<WorkerNode>> {
        let mut nodes = self.nodes.read()?.keys().cloned().collect::<Vec<_>>();
        nodes.sort();
        Ok(nodes)
    }
}

impl WorkerNodeSource for ClusterMembership {
    fn active_worker_nodes(&self) -> Result<Vec<WorkerNode>> {
        let mut nodes = self
            .nodes
            .read()?
            .iter()
            .filter(|(_, state)| **state == WorkerNodeState::Active)
            .map(|(node, _)| node.clone())
            .collect::<Vec<_>>();
        nodes.sort();
        Ok(nodes)
    }
}
