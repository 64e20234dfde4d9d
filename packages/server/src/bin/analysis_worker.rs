// Standalone orchestration worker.
//
// Joins the analysis-workers queue group so each analyze message is
// processed by exactly one instance. Runs against process-local
// in-memory stores; deployments that split submitter and worker across
// processes need a shared store implementation behind the same traits.

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::{
    AnalysisWorker, AnalysisWorkerConfig, HttpFetcher, JobProcessor, MemoryJobStore,
    MemoryTaskStore, NatsClientPublisher, ServiceHost,
};
use server_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting analysis worker");

    let config = Config::from_env().context("Failed to load configuration")?;

    let client = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    tracing::info!(nats_url = %config.nats_url, "NATS connected");

    let processor = JobProcessor::new(
        Arc::new(NatsClientPublisher::new(client.clone())),
        Arc::new(MemoryJobStore::new()),
        Arc::new(MemoryTaskStore::new()),
        Arc::new(HttpFetcher::new(config.fetch_timeout)?),
        Arc::new(analysis::HttpLinkChecker::new(config.link_check_timeout)?),
        config.fetch_timeout,
    );
    let worker = AnalysisWorker::new(client, processor, AnalysisWorkerConfig::default());

    ServiceHost::new()
        .with_service(worker)
        .run_until_shutdown()
        .await
}
