//! GLM Payment Ledger Indexer
//!
//! Runs the periodic explorer sync and the ledger read API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use glm_ledger_indexer::{
    api,
    config::IndexerConfig,
    core::{LedgerStore, TransferSource, WatermarkStore},
    database::{MemoryStore, PostgresStore},
    source::{ExplorerClient, RateLimiter},
    sync::{self, SyncOrchestrator},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glm-ledger-indexer")]
#[command(about = "GLM payment ledger indexer")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Keep the ledger in memory instead of PostgreSQL; nothing is persisted
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sync scheduler and the read API (default)
    Serve,
    /// Run the sync scheduler only
    Sync {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Serve the read API only
    Api,
}

struct Stores {
    ledger: Arc<dyn LedgerStore>,
    watermarks: Arc<dyn WatermarkStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !std::path::Path::new(&cli.config).exists() {
        eprintln!("Config file not found, using defaults and environment: {}", cli.config);
    }
    let mut config = IndexerConfig::load(Some(&cli.config))?;

    // Override log level if provided
    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }

    init_logging(&config)?;

    info!("Starting GLM ledger indexer");
    info!("Chain ID: {}", config.chain.chain_id);
    info!("Token contract: {}", config.chain.token_contract);

    let command = cli.command.unwrap_or(Command::Serve);
    let needs_sync = !matches!(command, Command::Api);
    if needs_sync {
        config.require_sync_identity()?;
        info!("Master wallet: {}", config.chain.master_wallet);
    }

    let stores = open_stores(&config, cli.dry_run).await?;

    match command {
        Command::Serve => {
            let orchestrator = build_orchestrator(&config, &stores)?;
            let api_server = api::start_server(stores.ledger.clone(), &config.api).await?;

            let interval = Duration::from_secs(config.sync.interval_secs);
            let scheduler = tokio::spawn(sync::run_scheduler(orchestrator, interval, shutdown_signal()));

            info!("Indexer started successfully. Press Ctrl+C to shutdown.");
            tokio::select! {
                result = scheduler => {
                    if let Err(e) = result {
                        error!("Scheduler task error: {}", e);
                    }
                }
                _ = api_server => {
                    warn!("API server finished");
                }
            }
        }
        Command::Sync { once: true } => {
            let orchestrator = build_orchestrator(&config, &stores)?;
            if sync::run_once(&orchestrator).await.is_none() {
                anyhow::bail!("sync cycle aborted");
            }
        }
        Command::Sync { once: false } => {
            let orchestrator = build_orchestrator(&config, &stores)?;
            let interval = Duration::from_secs(config.sync.interval_secs);
            sync::run_scheduler(orchestrator, interval, shutdown_signal()).await;
        }
        Command::Api => {
            let api_server = api::start_server(stores.ledger.clone(), &config.api).await?;
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = api_server => {
                    warn!("API server finished");
                }
            }
        }
    }

    info!("Shutting down GLM ledger indexer");
    Ok(())
}

async fn open_stores(config: &IndexerConfig, dry_run: bool) -> Result<Stores> {
    if dry_run {
        warn!("Dry run mode - ledger is kept in memory and discarded on exit");
        let store = Arc::new(MemoryStore::new());
        return Ok(Stores {
            ledger: store.clone(),
            watermarks: store,
        });
    }

    info!("Initializing database connection...");
    let store = Arc::new(PostgresStore::connect(&config.database).await?);
    store.run_migrations().await?;
    info!("Database migrations applied");

    Ok(Stores {
        ledger: store.clone(),
        watermarks: store,
    })
}

fn build_orchestrator(config: &IndexerConfig, stores: &Stores) -> Result<Arc<SyncOrchestrator>> {
    let limiter = Arc::new(RateLimiter::new(config.source.rate_limit_per_sec));
    let source: Arc<dyn TransferSource> =
        Arc::new(ExplorerClient::new(&config.source, &config.chain, limiter)?);

    Ok(Arc::new(SyncOrchestrator::new(
        source,
        stores.ledger.clone(),
        stores.watermarks.clone(),
        config,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

fn init_logging(config: &IndexerConfig) -> Result<()> {
    let log_level = config
        .monitoring
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("glm_ledger_indexer={},sqlx=warn,tower_http=info", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}
