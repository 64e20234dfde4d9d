// Main entry point for the API server.
//
// Hosts the REST surface, the WebSocket hub with its notification
// bridge, and an in-process analysis worker sharing the same stores.
// Standalone workers (see the analysis_worker binary) can be added
// alongside once a shared store backend is wired in.

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::{
    AnalysisWorker, AnalysisWorkerConfig, HttpFetcher, JobProcessor, MemoryJobStore,
    MemoryTaskStore, NatsClientPublisher, NotificationBridge, NotificationHub, ServiceHost,
};
use server_core::server::{build_app, AppState, HttpService};
use server_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting URL analysis server");

    let config = Config::from_env().context("Failed to load configuration")?;

    let client = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    tracing::info!(nats_url = %config.nats_url, "NATS connected");

    let publisher = Arc::new(NatsClientPublisher::new(client.clone()));
    let job_store = Arc::new(MemoryJobStore::new());
    let task_store = Arc::new(MemoryTaskStore::new());
    let hub = Arc::new(NotificationHub::new());

    let bridge = NotificationBridge::new(client.clone(), Arc::clone(&hub))
        .start()
        .await
        .context("Failed to start notification bridge")?;

    let processor = JobProcessor::new(
        publisher.clone(),
        job_store.clone(),
        task_store.clone(),
        Arc::new(HttpFetcher::new(config.fetch_timeout)?),
        Arc::new(analysis::HttpLinkChecker::new(config.link_check_timeout)?),
        config.fetch_timeout,
    );
    let worker = AnalysisWorker::new(client, processor, AnalysisWorkerConfig::default());

    let state = AppState {
        job_store,
        task_store,
        publisher,
        hub: Arc::clone(&hub),
    };
    let app = build_app(state);

    tracing::info!(port = config.port, "Health check: http://localhost:{}/health", config.port);

    ServiceHost::new()
        .with_service(HttpService::new(app, config.port))
        .with_service(worker)
        .run_until_shutdown()
        .await?;

    bridge.stop();
    hub.close_all();

    Ok(())
}
