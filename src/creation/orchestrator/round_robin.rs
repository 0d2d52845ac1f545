impl ShardCreationOrchestrator {
    /// Creates `shard_count` shards for a hash-distributed table, placing
    /// `replication_factor` replicas of each on consecutive workers.
    ///
    /// Shard `i` starts at worker `i % W` of the sorted roster. Under the
    /// single-backup policy one extra worker is tried when the cluster has a
    /// spare.
    pub async fn round_robin_create(
        &self,
        session: &SessionContext,
        table_id: TableId,
        shard_count: i32,
        replication_factor: i32,
    ) -> Result<ShardCreationReport> {
        let span = info_span!(
            "shard_creation.round_robin",
            operation_id = %Uuid::new_v4(),
            table_id,
            shard_count,
            replication_factor
        );
        self.round_robin_create_inner(session, table_id, shard_count, replication_factor)
            .instrument(span)
            .await
    }

    /// `round_robin_create` addressed by table name.
    pub async fn create_worker_shards(
        &self,
        session: &SessionContext,
        table_name: &str,
        shard_count: i32,
        replication_factor: i32,
    ) -> Result<ShardCreationReport> {
        let table = self.store.resolve_table(table_name)?;
        self.round_robin_create(session, table.table_id, shard_count, replication_factor)
            .await
    }

    /// `round_robin_create` with the configured shard count and
    /// replication factor.
    pub async fn create_worker_shards_with_defaults(
        &self,
        session: &SessionContext,
        table_name: &str,
    ) -> Result<ShardCreationReport> {
        self.create_worker_shards(
            session,
            table_name,
            self.config.default_shard_count,
            self.config.default_replication_factor,
        )
        .await
    }

    async fn round_robin_create_inner(
        &self,
        session: &SessionContext,
        table_id: TableId,
        shard_count: i32,
        replication_factor: i32,
    ) -> Result<ShardCreationReport> {
        self.cancel.check()?;

        let table = self.store.table(table_id)?;
        table.ensure_hash_partitioned()?;
        session.ensure_table_owner(&table)?;
        if shard_count <= 0 {
            return Err(DbError::InvalidArgument(
                "shard_count must be positive".to_string(),
            ));
        }
        if replication_factor <= 0 {
            return Err(DbError::InvalidArgument(
                "replication_factor must be positive".to_string(),
            ));
        }
        let replication_factor = replication_factor as usize;

        let _table_lock = self
            .locks
            .lock_relation_distribution_metadata(table_id, LockMode::Exclusive)
            .await?;
        self.ensure_no_shards(&table)?;

        let ranges = partition_hash_space(shard_count)?;
        let ddl = self.load_table_ddl(&table, ranges.len())?;
        let roster = WorkerRoster::load(self.workers.as_ref())?;
        PlacementPlanner::ensure_capacity(replication_factor, roster.len())?;
        event!(
            Level::DEBUG,
            workers = roster.len(),
            ddl_commands = ddl.commands.len(),
            foreign_constraints = ddl.foreign_constraints.len(),
            "creating shards for table \"{}\"",
            table.name
        );

        let hold = self.cancel.hold()?;
        let mut shards = Vec::with_capacity(ranges.len());
        for (shard_index, range) in ranges.into_iter().enumerate() {
            let plan = self.planner.plan(shard_index, &roster, replication_factor)?;
            let interval = ShardInterval {
                shard_id: self.store.next_shard_id(),
                table_id,
                storage_type: table.shard_storage_type(),
                range: Some(range),
            };
            let shard = self
                .create_planned_shard(&table, interval, &ddl, &roster, plan)
                .await
                .inspect_err(|err| {
                    event!(Level::ERROR, shard_index, error = %err, "shard creation failed");
                })?;
            shards.push(shard);
        }
        let cancel_ignored = hold.release();

        event!(
            Level::INFO,
            shards = shards.len(),
            "created shards for table \"{}\"",
            table.name
        );
        Ok(ShardCreationReport::new(table_id, &shards, cancel_ignored))
    }
}
