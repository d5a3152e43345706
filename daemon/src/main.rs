//! Rewards daemon: collects delegation states from a node and serves them
//! from the local store.

use anyhow::Context;
use clap::Parser;
use rewards_chain::RpcChainSource;
use rewards_collector::{
    init_logging, CollectorConfig, Engine, EngineSettings, FetchCoordinator, FetchOptions,
    ShutdownController,
};
use rewards_store::DelegationStateStore;
use rewards_store_lmdb::{LmdbDelegationStateStore, LmdbEnvironment};
use rewards_types::{Address, Cycle};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rewards-daemon", about = "Delegation state collector daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "REWARDS_CONFIG")]
    config: Option<PathBuf>,

    /// Node RPC endpoint.
    #[arg(long, env = "REWARDS_RPC_URL")]
    rpc_url: Option<String>,

    /// Data directory for the state store.
    #[arg(long, env = "REWARDS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "REWARDS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "REWARDS_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Collect every newly completed cycle until interrupted.
    Run,
    /// Collect one cycle and print the report.
    Fetch {
        #[arg(long)]
        cycle: Cycle,
        /// Recompute states that are already stored.
        #[arg(long)]
        force: bool,
        /// Log every ledger entry applied during the replay.
        #[arg(long)]
        debug: bool,
    },
    /// Print a stored delegation state as JSON.
    State {
        #[arg(long)]
        delegate: String,
        #[arg(long)]
        cycle: Cycle,
    },
    /// Print own/external statistics of a stored cycle as JSON.
    Statistics {
        #[arg(long)]
        cycle: Cycle,
    },
    /// Print the last cycle present in the store.
    LastCycle,
}

/// File config as the base, CLI flags and env vars on top.
fn load_config(cli: &Cli) -> anyhow::Result<CollectorConfig> {
    let mut config = match &cli.config {
        Some(path) => CollectorConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CollectorConfig::default(),
    };
    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(log_format) = &cli.log_format {
        config.log_format = log_format.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_store(
    config: &CollectorConfig,
) -> anyhow::Result<(LmdbEnvironment, Arc<LmdbDelegationStateStore>)> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let store = Arc::new(env.delegation_state_store(config.storage.retention()));
    Ok((env, store))
}

fn build_engine(
    config: &CollectorConfig,
    store: Arc<LmdbDelegationStateStore>,
) -> anyhow::Result<Engine<RpcChainSource, LmdbDelegationStateStore>> {
    let chain = RpcChainSource::with_timeout(&config.rpc_url, config.request_timeout())
        .context("creating RPC client")?;
    Ok(Engine::new(
        Arc::new(chain),
        store,
        Arc::new(FetchCoordinator::new()),
        EngineSettings::from_config(config),
    ))
}

/// Cancel `shutdown` on SIGINT/SIGTERM. The task ends once shutdown is
/// triggered either way.
fn watch_signals(shutdown: &Arc<ShutdownController>) -> tokio::task::JoinHandle<()> {
    let shutdown = Arc::clone(shutdown);
    tokio::spawn(async move { shutdown.wait_for_signal().await })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level)?;

    let (_env, store) = open_store(&config)?;

    match cli.command {
        Command::Run => {
            tracing::info!(
                rpc_url = %config.rpc_url,
                data_dir = %config.data_dir.display(),
                retention = ?config.storage.retention(),
                "starting collector"
            );
            let engine = build_engine(&config, store)?;
            let shutdown = Arc::new(ShutdownController::new());
            let signals = watch_signals(&shutdown);

            engine.run(shutdown.token()).await?;
            shutdown.shutdown();
            signals.await?;
            tracing::info!("rewards daemon exited cleanly");
        }
        Command::Fetch {
            cycle,
            force,
            debug,
        } => {
            let engine = build_engine(&config, store)?;
            let shutdown = Arc::new(ShutdownController::new());
            let signals = watch_signals(&shutdown);

            let options = FetchOptions { force, debug };
            let result = engine.fetch_cycle(cycle, options, &shutdown.token()).await;
            shutdown.shutdown();
            signals.await?;
            let report = result?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_complete() {
                anyhow::bail!("cycle {cycle} is incomplete");
            }
        }
        Command::State { delegate, cycle } => {
            let delegate = Address::parse(delegate)?;
            let state = store
                .get(&delegate, cycle)
                .with_context(|| format!("state of {delegate} for cycle {cycle}"))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Statistics { cycle } => {
            let statistics = store.statistics(cycle)?;
            println!("{}", serde_json::to_string_pretty(&statistics)?);
        }
        Command::LastCycle => {
            println!("{}", store.last_fetched_cycle()?);
        }
    }

    Ok(())
}
