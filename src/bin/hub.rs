use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use greenhouse_hub::{
    actors::ingest::{IngestConfig, IngestHandle},
    advisory::{AdvisoryService, ChatCompletionsClient},
    api::{ApiState, spawn_api_server},
    config::{Config, StorageConfig},
    hub::BroadcastHub,
    pipeline::Pipeline,
    storage::{MemoryBackend, StorageBackend},
};
use tokio::sync::oneshot;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults and environment are used without one
    #[arg(short)]
    file: Option<String>,

    /// Log everything down to TRACE
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    dotenv::dotenv().ok();

    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::DEBUG
    };

    let filter = filter::Targets::new().with_targets(vec![
        ("greenhouse_hub", level),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::Memory => {
            warn!("using in-memory storage, readings are lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = greenhouse_hub::storage::sqlite::SqliteBackend::new(path)
                .await
                .with_context(|| format!("failed to open database {}", path.display()))?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("SQLite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = Config::load(args.file.as_deref())?;

    let store = open_store(&config.storage).await?;
    let hub = BroadcastHub::default();
    let pipeline = Pipeline::new(store.clone(), Arc::new(hub.clone()));

    // A listener that cannot bind leaves the HTTP surface running
    let ingest = match IngestHandle::spawn(IngestConfig::from(&config.udp), pipeline.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("sensor ingestion disabled: {e}");
            None
        }
    };

    let client = ChatCompletionsClient::from_config(&config.advisor)
        .context("failed to build advisory HTTP client")?;
    if !client.is_configured() {
        warn!("ADVISOR_API_KEY not set, advisories will report that they are not configured");
    }
    let advisory = AdvisoryService::new(store.clone(), Arc::new(client), config.advisor.max_tokens);

    let mut state = ApiState::new(pipeline, hub, advisory);
    if let Some(handle) = &ingest {
        state = state.with_ingest(handle.clone());
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (addr, server) = spawn_api_server(&config.http, state, async {
        let _ = stop_rx.await;
    })
    .await
    .context("failed to start API server")?;

    info!("hub ready: http on {addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    if let Some(handle) = ingest {
        match handle.shutdown().await {
            Ok(stats) => info!("ingestion final stats: {stats:?}"),
            Err(e) => warn!("ingestion loop did not stop cleanly: {e:#}"),
        }
    }

    let _ = stop_tx.send(());
    if let Err(e) = server.await {
        error!("API server task failed: {e}");
    }

    store.close().await.context("failed to close storage")?;
    info!("bye");

    Ok(())
}
