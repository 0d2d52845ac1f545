/// Immutable, ordered snapshot of the workers eligible for placement.
///
/// Taken once at the start of an operation so concurrent topology changes
/// cannot shift round-robin positions halfway through a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRoster {
    nodes: Vec<WorkerNode>,
}

impl WorkerRoster {
    pub fn load(source: &dyn WorkerNodeSource) -> Result<Self> {
        Ok(Self::from_nodes(source.active_worker_nodes()?))
    }

    /// Builds a roster from arbitrary input, sorting by host then port and
    /// collapsing duplicates.
    pub fn from_nodes(mut nodes: Vec<WorkerNode>) -> Self {
        nodes.sort();
        nodes.dedup();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[WorkerNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the roster cyclically starting at `start`, yielding at most
    /// `count` entries and never the same node twice.
    pub fn cyclic(&self, start: usize, count: usize) -> impl Iterator<Item = &WorkerNode> + '_ {
        let len = self.nodes.len();
        let count = count.min(len);
        (0..count).map(move |offset| &self.nodes[(start + offset) % len])
    }
}
