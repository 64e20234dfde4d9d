//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::kernel::hub::NotificationHub;
use crate::kernel::jobs::{JobStore, TaskStore};
use crate::kernel::nats::NatsPublisher;
use crate::kernel::service::Service;
use crate::server::routes::{
    analyze_handler, health_handler, job_tasks_handler, list_jobs_handler, ws_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub task_store: Arc<dyn TaskStore>,
    pub publisher: Arc<dyn NatsPublisher>,
    pub hub: Arc<NotificationHub>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // The upgrade endpoint accepts any origin; WebSocket clients are
    // not authenticated by design.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/jobs/:job_id/tasks", get(job_tasks_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The HTTP listener as a hosted service, so the API and the worker
/// share one shutdown path.
pub struct HttpService {
    router: Router,
    port: u16,
}

impl HttpService {
    pub fn new(router: Router, port: u16) -> Self {
        Self { router, port }
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &'static str {
        "http-server"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .context("Failed to bind to address")?;
        info!(addr = %addr, "http server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("Server error")?;

        Ok(())
    }
}
