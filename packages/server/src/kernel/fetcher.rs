//! Page content fetching behind a trait seam.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

/// Fetches the raw content of an analysis target.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// HTTP fetcher over a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("fetch of {url} failed with status {status}");
        }
        Ok(response.text().await?)
    }
}

/// Canned-response fetcher for tests: bodies by URL string, everything
/// else errors.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: RwLock<HashMap<String, String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        match self
            .bodies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url.as_str())
        {
            Some(body) => Ok(body.clone()),
            None => bail!("fetch of {url} failed with status 404 Not Found"),
        }
    }
}
