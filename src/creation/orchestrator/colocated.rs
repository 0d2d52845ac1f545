impl ShardCreationOrchestrator {
    /// Gives `target` one shard per shard of `source`, with the same hash
    /// range and on exactly the same workers.
    ///
    /// Placements are copied regardless of their state. Every copy must
    /// succeed; there is no fallback to other workers.
    pub async fn colocated_create(
        &self,
        session: &SessionContext,
        target_id: TableId,
        source_id: TableId,
    ) -> Result<ShardCreationReport> {
        let span = info_span!(
            "shard_creation.colocated",
            operation_id = %Uuid::new_v4(),
            table_id = target_id,
            source_table_id = source_id
        );
        self.colocated_create_inner(session, target_id, source_id)
            .instrument(span)
            .await
    }

    /// `colocated_create` addressed by table name.
    pub async fn create_colocated_shards(
        &self,
        session: &SessionContext,
        target_name: &str,
        source_name: &str,
    ) -> Result<ShardCreationReport> {
        let target = self.store.resolve_table(target_name)?;
        let source = self.store.resolve_table(source_name)?;
        self.colocated_create(session, target.table_id, source.table_id)
            .await
    }

    async fn colocated_create_inner(
        &self,
        session: &SessionContext,
        target_id: TableId,
        source_id: TableId,
    ) -> Result<ShardCreationReport> {
        self.cancel.check()?;

        if target_id == source_id {
            return Err(DbError::InvalidArgument(
                "cannot colocate a table with itself".to_string(),
            ));
        }
        let target = self.store.table(target_id)?;
        let source = self.store.table(source_id)?;
        target.ensure_hash_partitioned()?;
        source.ensure_hash_partitioned()?;
        session.ensure_table_owner(&target)?;

        // Target before source, then source shards in id order. The source
        // distribution lock waits out a creation still running on the source.
        let _target_lock = self
            .locks
            .lock_relation_distribution_metadata(target_id, LockMode::Exclusive)
            .await?;
        let _source_distribution_lock = self
            .locks
            .lock_relation_distribution_metadata(source_id, LockMode::Share)
            .await?;
        let _source_lock = self
            .locks
            .lock_relation(source_id, LockMode::AccessShare)
            .await?;
        let source_shards = self.store.load_shard_interval_list(source_id)?;
        let source_shard_ids: Vec<ShardId> = source_shards.iter().map(|s| s.shard_id).collect();
        let _source_shard_locks = self
            .locks
            .lock_shard_list_metadata(&source_shard_ids, LockMode::Share)
            .await?;

        self.ensure_no_shards(&target)?;
        if source_shards.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "table \"{}\" has no shards to colocate with",
                source.name
            )));
        }
        let ddl = self.load_table_ddl(&target, source_shards.len())?;

        let hold = self.cancel.hold()?;
        let mut shards = Vec::with_capacity(source_shards.len());
        for (shard_index, source_shard) in source_shards.iter().enumerate() {
            let nodes: Vec<WorkerNode> = self
                .store
                .shard_placement_list(source_shard.shard_id)?
                .into_iter()
                .map(|placement| placement.node)
                .collect();
            let interval = ShardInterval {
                shard_id: self.store.next_shard_id(),
                table_id: target_id,
                storage_type: target.shard_storage_type(),
                range: source_shard.range,
            };
            let shard = self
                .create_colocated_shard(&target, &source, interval, shard_index, &ddl, &nodes)
                .await?;
            shards.push(shard);
        }
        let cancel_ignored = hold.release();

        event!(
            Level::INFO,
            shards = shards.len(),
            "colocated table \"{}\" with \"{}\"",
            target.name,
            source.name
        );
        Ok(ShardCreationReport::new(target_id, &shards, cancel_ignored))
    }

    async fn create_colocated_shard(
        &self,
        target: &DistributedTable,
        source: &DistributedTable,
        interval: ShardInterval,
        shard_index: usize,
        ddl: &TableDdl,
        nodes: &[WorkerNode],
    ) -> Result<CommittedShard> {
        let shard_lock = self
            .locks
            .lock_shard_distribution_metadata(interval.shard_id, LockMode::Exclusive)
            .await?;
        let request = ddl.shard_request(target, interval.shard_id, shard_index)?;

        let outcomes = self.creator.create_on_nodes(&request, nodes).await;
        let created: Vec<WorkerNode> = outcomes
            .iter()
            .filter(|(_, created)| *created)
            .map(|(node, _)| node.clone())
            .collect();
        if created.len() != nodes.len() {
            event!(
                Level::ERROR,
                shard_id = interval.shard_id,
                created = created.len(),
                required = nodes.len(),
                "could not create colocated shard on every source placement"
            );
            self.creator.compensate(&request, &created).await;
            return Err(DbError::ColocationFailed {
                target: target.name.clone(),
                source_table: source.name.clone(),
            });
        }

        let mut pending = self.writer.insert_shard(interval, &shard_lock)?;
        for node in nodes {
            pending.insert_placement(node.clone(), PlacementState::Finalized, EMPTY_SHARD_SIZE);
        }
        match pending.commit() {
            Ok(committed) => Ok(committed),
            Err(err) => {
                self.creator.compensate(&request, &created).await;
                Err(err)
            }
        }
    }
}
