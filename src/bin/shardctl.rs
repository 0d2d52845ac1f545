use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use shardcoord::{
    ClusterMembership, DistributedTable, InMemoryDdlSource, InMemoryWorkerTransport,
    MetadataStore, PartitionMethod, PlacementPlanner, PlacementPolicy, SessionContext,
    ShardCreationConfig, ShardCreationOrchestrator, WorkerNode, WorkerRoster,
    partition_hash_space,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shardctl")]
#[command(about = "Plan and simulate shard creation for distributed tables")]
struct Cli {
    /// JSON file holding a shard creation config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print hash ranges and candidate workers for every shard
    Plan {
        #[arg(long)]
        shard_count: Option<i32>,
        #[arg(long)]
        replication_factor: Option<i32>,
        #[arg(long, value_delimiter = ',', required = true)]
        workers: Vec<String>,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Create shards against an in-memory cluster and print the catalog
    Simulate {
        #[arg(long, default_value = "events")]
        table: String,
        #[arg(long, default_value = "postgres")]
        owner: String,
        /// Table DDL; defaults to a single BIGINT column
        #[arg(long)]
        ddl: Option<String>,
        #[arg(long)]
        shard_count: Option<i32>,
        #[arg(long)]
        replication_factor: Option<i32>,
        #[arg(long, value_delimiter = ',', required = true)]
        workers: Vec<String>,
        /// Workers that reject every shard
        #[arg(long, value_delimiter = ',')]
        fail: Vec<String>,
        /// Create a reference table instead of hash shards
        #[arg(long)]
        reference: bool,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Write the resulting catalog snapshot here
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Strict,
    SingleBackup,
    Exhaustive,
}

impl From<PolicyArg> for PlacementPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => PlacementPolicy::Strict,
            PolicyArg::SingleBackup => PlacementPolicy::SingleBackup,
            PolicyArg::Exhaustive => PlacementPolicy::Exhaustive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Plan {
            shard_count,
            replication_factor,
            workers,
            policy,
        } => plan(
            &config,
            shard_count.unwrap_or(config.default_shard_count),
            replication_factor.unwrap_or(config.default_replication_factor),
            &workers,
            policy.map(Into::into),
        ),
        Command::Simulate {
            table,
            owner,
            ddl,
            shard_count,
            replication_factor,
            workers,
            fail,
            reference,
            policy,
            snapshot_out,
        } => {
            let mut config = config;
            if let Some(policy) = policy {
                config = config.placement_policy(policy.into());
            }
            let ddl = ddl.unwrap_or_else(|| format!("CREATE TABLE {} (id BIGINT)", table));
            let params = SimulateParams {
                table,
                owner,
                ddl,
                shard_count: shard_count.unwrap_or(config.default_shard_count),
                replication_factor: replication_factor
                    .unwrap_or(config.default_replication_factor),
                reference,
            };
            simulate(config, params, &workers, &fail, snapshot_out.as_deref()).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ShardCreationConfig> {
    let Some(path) = path else {
        return Ok(ShardCreationConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config '{}'", path.display()))
}

fn parse_workers(workers: &[String]) -> Result<Vec<WorkerNode>> {
    workers
        .iter()
        .map(|worker| {
            worker
                .parse::<WorkerNode>()
                .with_context(|| format!("Invalid worker '{}'", worker))
        })
        .collect()
}

fn plan(
    config: &ShardCreationConfig,
    shard_count: i32,
    replication_factor: i32,
    workers: &[String],
    policy: Option<PlacementPolicy>,
) -> Result<()> {
    if replication_factor <= 0 {
        bail!("replication_factor must be positive");
    }
    let roster = WorkerRoster::from_nodes(parse_workers(workers)?);
    let planner = PlacementPlanner::new(policy.unwrap_or(config.placement_policy));
    let ranges = partition_hash_space(shard_count)?;

    let mut shards = Vec::with_capacity(ranges.len());
    for (shard_index, range) in ranges.iter().enumerate() {
        let plan = planner.plan(shard_index, &roster, replication_factor as usize)?;
        let candidates: Vec<String> = plan.candidates(&roster).map(|n| n.to_string()).collect();
        shards.push(json!({
            "shard_index": shard_index,
            "min_value": range.min,
            "max_value": range.max,
            "attempt_budget": plan.attempt_budget,
            "candidates": candidates,
        }));
    }

    let output = json!({
        "policy": planner.policy(),
        "workers": roster.nodes().iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        "replication_factor": replication_factor,
        "shards": shards,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

struct SimulateParams {
    table: String,
    owner: String,
    ddl: String,
    shard_count: i32,
    replication_factor: i32,
    reference: bool,
}

async fn simulate(
    config: ShardCreationConfig,
    params: SimulateParams,
    workers: &[String],
    failing: &[String],
    snapshot_out: Option<&Path>,
) -> Result<()> {
    let nodes = parse_workers(workers)?;
    let transport = InMemoryWorkerTransport::new();
    for node in &nodes {
        transport.register_worker(node.clone()).await?;
    }
    for node in parse_workers(failing)? {
        transport
            .set_worker_failing(&node, true)
            .await
            .with_context(|| format!("Cannot fail unknown worker '{}'", node))?;
    }
    let membership = ClusterMembership::new(nodes)?;

    let partition_method = if params.reference {
        PartitionMethod::Reference
    } else {
        PartitionMethod::Hash
    };
    let store = Arc::new(MetadataStore::new());
    store.register_table(DistributedTable::new(
        1,
        &params.table,
        partition_method,
        &params.owner,
    ))?;
    let ddl_source = InMemoryDdlSource::new();
    ddl_source.register_table_ddl(1, &params.ddl)?;

    let orchestrator = ShardCreationOrchestrator::new(
        store.clone(),
        Arc::new(membership),
        Arc::new(transport),
        Arc::new(ddl_source),
        config,
    );
    let session = SessionContext::new(&params.owner);
    let report = if params.reference {
        orchestrator
            .create_reference_table_shard(&session, &params.table)
            .await?
    } else {
        orchestrator
            .create_worker_shards(
                &session,
                &params.table,
                params.shard_count,
                params.replication_factor,
            )
            .await?
    };

    if let Some(path) = snapshot_out {
        store
            .save_snapshot(path)
            .with_context(|| format!("Failed to write snapshot '{}'", path.display()))?;
        eprintln!("Wrote catalog snapshot: {}", path.display());
    }
    let output = json!({
        "report": report,
        "catalog": store.snapshot()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
