//! Link reachability checking.
//!
//! Trait-based so the orchestration worker can run against a recorded
//! checker in tests, mirroring the fetcher/ingestor mock pattern.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// Decides whether a discovered link is reachable.
#[async_trait]
pub trait LinkChecker: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// HTTP link checker: HEAD first, GET when the server rejects HEAD.
pub struct HttpLinkChecker {
    client: reqwest::Client,
}

impl HttpLinkChecker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        let head = self.client.head(url).send().await;
        let status = match head {
            Ok(resp) if resp.status() == StatusCode::METHOD_NOT_ALLOWED => {
                match self.client.get(url).send().await {
                    Ok(resp) => resp.status(),
                    Err(e) => {
                        debug!(url, error = %e, "link GET failed");
                        return false;
                    }
                }
            }
            Ok(resp) => resp.status(),
            Err(e) => {
                debug!(url, error = %e, "link HEAD failed");
                return false;
            }
        };
        status.is_success()
    }
}

/// Fixed-answer checker for tests: a default verdict plus per-URL
/// overrides.
#[derive(Default)]
pub struct StaticLinkChecker {
    default_reachable: bool,
    overrides: HashMap<String, bool>,
}

impl StaticLinkChecker {
    pub fn all(reachable: bool) -> Self {
        Self {
            default_reachable: reachable,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, url: impl Into<String>, reachable: bool) -> Self {
        self.overrides.insert(url.into(), reachable);
        self
    }
}

#[async_trait]
impl LinkChecker for StaticLinkChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        self.overrides
            .get(url)
            .copied()
            .unwrap_or(self.default_reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_checker_honors_overrides() {
        let checker =
            StaticLinkChecker::all(true).with_override("https://dead.example.com/", false);

        assert!(checker.is_reachable("https://example.com/").await);
        assert!(!checker.is_reachable("https://dead.example.com/").await);
    }
}
