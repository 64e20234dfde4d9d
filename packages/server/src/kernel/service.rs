//! Long-running service hosting.
//!
//! Each process is a set of independently scheduled services driven by
//! a shared `CancellationToken`; the host cancels on ctrl-c and waits
//! for every service to wind down.

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Run until completion or until `shutdown` is cancelled.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
    shutdown: CancellationToken,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// Token shared with every hosted service; cancelling it from
    /// outside stops the host.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run all services until ctrl-c (or external cancellation), then
    /// wait for them to stop.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let mut set = JoinSet::new();
        for service in self.services {
            let token = self.shutdown.clone();
            let name = service.name();
            set.spawn(async move {
                info!(service = name, "service starting");
                if let Err(e) = service.run(token).await {
                    error!(service = name, error = %e, "service exited with error");
                } else {
                    info!(service = name, "service stopped");
                }
            });
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            _ = self.shutdown.cancelled() => {}
        }
        self.shutdown.cancel();

        while set.join_next().await.is_some() {}
        Ok(())
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}
