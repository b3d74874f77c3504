//! Weather ingest daemon
//!
//! This binary coordinates:
//! - Station connections and document parsing
//! - Staggered flushing of the latest station readings
//! - Batched inserts and retention deletes against MySQL

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wx_core::Connector;
use wx_db::MySqlConnector;
use wx_ingest::IngestServer;
use wx_queue::{
    rendezvous, spawn_reporter, BatchScheduler, RealtimeStatistics, RetentionSweeper,
    StationStore, WorkerPool,
};

use crate::config::DaemonConfig;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("WX_LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting weather ingest daemon");

    // Load configuration
    let config = DaemonConfig::load()?;
    info!("Loaded configuration: {:?}", config);
    let scheduler_config = config.scheduler_config()?;

    let stats = Arc::new(RealtimeStatistics::new());
    spawn_reporter(Arc::clone(&stats), Duration::from_secs(1));

    let connector: Arc<dyn Connector> =
        Arc::new(MySqlConnector::new(&config.db_url).context("Invalid db_url")?);

    // Every worker needs a connection; without all of them there is nothing to run
    let (chunk_tx, chunk_rx) = rendezvous::channel(config.insert_query_threads);
    let workers = WorkerPool::start(
        Arc::clone(&connector),
        config.insert_query_threads,
        chunk_rx,
        Arc::clone(&stats),
    )
    .await
    .context("Failed to open insert connections")?;
    info!("Connected {} insert workers", workers.len());

    let store = Arc::new(StationStore::new(scheduler_config.tick_count()));
    let scheduler = BatchScheduler::new(Arc::clone(&store), scheduler_config)?;
    let scheduler_handle = tokio::spawn(scheduler.run(chunk_tx));

    if config.auto_deletion_enabled() {
        RetentionSweeper::new(
            Arc::clone(&connector),
            Arc::clone(&stats),
            config.auto_deletion_max_age_seconds,
        )
        .spawn();
    } else {
        info!("Automatic deletion of old readings disabled");
    }

    let server = IngestServer::bind(config.listen_addr(), store, stats)
        .await
        .context("Failed to start station listener")?;

    info!("Daemon running - press Ctrl+C to stop");

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Station listener error: {}", e);
                return Err(e.into());
            }
        }
        result = scheduler_handle => {
            error!("Batch scheduler exited: {:?}", result);
            anyhow::bail!("batch scheduler stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Weather ingest daemon stopped");
    Ok(())
}
