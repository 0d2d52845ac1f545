impl ShardCreationOrchestrator {
    /// Creates the single shard of a reference table with a replica on
    /// every active worker.
    pub async fn reference_table_create(
        &self,
        session: &SessionContext,
        table_id: TableId,
    ) -> Result<ShardCreationReport> {
        let span = info_span!(
            "shard_creation.reference",
            operation_id = %Uuid::new_v4(),
            table_id
        );
        self.reference_table_create_inner(session, table_id)
            .instrument(span)
            .await
    }

    /// `reference_table_create` addressed by table name.
    pub async fn create_reference_table_shard(
        &self,
        session: &SessionContext,
        table_name: &str,
    ) -> Result<ShardCreationReport> {
        let table = self.store.resolve_table(table_name)?;
        self.reference_table_create(session, table.table_id).await
    }

    async fn reference_table_create_inner(
        &self,
        session: &SessionContext,
        table_id: TableId,
    ) -> Result<ShardCreationReport> {
        self.cancel.check()?;

        let table = self.store.table(table_id)?;
        if table.partition_method != PartitionMethod::Reference {
            return Err(DbError::UnsupportedPartitionType(table.partition_method));
        }
        session.ensure_table_owner(&table)?;

        let _table_lock = self
            .locks
            .lock_relation_distribution_metadata(table_id, LockMode::Exclusive)
            .await?;
        self.ensure_no_shards(&table)?;

        let ddl = self.load_table_ddl(&table, 1)?;
        let roster = WorkerRoster::load(self.workers.as_ref())?;
        if roster.is_empty() {
            return Err(DbError::InsufficientWorkers {
                replication_factor: 1,
                worker_count: 0,
            });
        }
        let plan = PlacementPlan {
            shard_index: 0,
            start_index: 0,
            attempt_budget: roster.len(),
            replication_factor: roster.len(),
        };
        let interval = ShardInterval {
            shard_id: self.store.next_shard_id(),
            table_id,
            storage_type: table.shard_storage_type(),
            range: None,
        };

        let hold = self.cancel.hold()?;
        let shard = self
            .create_planned_shard(&table, interval, &ddl, &roster, plan)
            .await?;
        let cancel_ignored = hold.release();

        event!(
            Level::INFO,
            replicas = shard.placements.len(),
            "created reference table shard for \"{}\"",
            table.name
        );
        Ok(ShardCreationReport::new(
            table_id,
            std::slice::from_ref(&shard),
            cancel_ignored,
        ))
    }
}
