/// How many candidate workers a shard may try before giving up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlacementPolicy {
    /// Exactly `replication_factor` attempts; any worker failure fails the shard.
    Strict,
    /// One extra attempt when the cluster has a spare worker.
    #[default]
    SingleBackup,
    /// Try every worker in the roster before giving up.
    Exhaustive,
}

/// Placement decision for one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacementPlan {
    pub shard_index: usize,
    pub start_index: usize,
    pub attempt_budget: usize,
    pub replication_factor: usize,
}

impl PlacementPlan {
    /// Candidate workers in attempt order.
    pub fn candidates<'a>(
        self,
        roster: &'a WorkerRoster,
    ) -> impl Iterator<Item = &'a WorkerNode> + 'a {
        roster.cyclic(self.start_index, self.attempt_budget)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementPlanner {
    policy: PlacementPolicy,
}

impl PlacementPlanner {
    pub fn new(policy: PlacementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Cluster-wide check made once, before any shard is attempted.
    pub fn ensure_capacity(replication_factor: usize, worker_count: usize) -> Result<()> {
        if replication_factor == 0 {
            return Err(DbError::InvalidArgument(
                "replication_factor must be positive".to_string(),
            ));
        }
        if replication_factor > worker_count {
            return Err(DbError::InsufficientWorkers {
                replication_factor,
                worker_count,
            });
        }
        Ok(())
    }

    pub fn attempt_budget(&self, replication_factor: usize, worker_count: usize) -> usize {
        match self.policy {
            PlacementPolicy::Strict => replication_factor,
            PlacementPolicy::SingleBackup if worker_count > replication_factor => {
                replication_factor + 1
            }
            PlacementPolicy::SingleBackup => replication_factor,
            PlacementPolicy::Exhaustive => worker_count,
        }
    }

    pub fn plan(
        &self,
        shard_index: usize,
        roster: &WorkerRoster,
        replication_factor: usize,
    ) -> Result<PlacementPlan> {
        Self::ensure_capacity(replication_factor, roster.len())?;
        Ok(PlacementPlan {
            shard_index,
            start_index: shard_index % roster.len(),
            attempt_budget: self.attempt_budget(replication_factor, roster.len()),
            replication_factor,
        })
    }
}
