//! Page and API fetching used by the extractors
//!
//! Extractors only ever see the [`Fetcher`] trait. [`HttpFetcher`] is the
//! reqwest-backed implementation; [`MemoryFetcher`] serves canned bodies and
//! records every request, which keeps extraction testable offline.

use crate::utils::error::CctvError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Builds `base?k=v&...` with proper percent-encoding
pub fn build_url(base: &str, query: &[(&str, &str)]) -> Result<Url> {
    let url = if query.is_empty() {
        Url::parse(base)
    } else {
        Url::parse_with_params(base, query)
    };
    url.with_context(|| format!("Invalid URL: {}", base))
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text
    async fn fetch_text(&self, url: &Url) -> Result<String>;

    /// GET `url` and parse the body as JSON
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let body = self.fetch_text(url).await?;
        let value = serde_json::from_str(&body)
            .map_err(|e| CctvError::Request(format!("{}: invalid JSON: {}", url, e)))?;
        Ok(value)
    }
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(CctvError::Network)?;

        if !resp.status().is_success() {
            return Err(CctvError::Request(format!("HTTP {} for {}", resp.status(), url)).into());
        }

        Ok(resp.text().await.map_err(CctvError::Network)?)
    }
}

/// In-memory fetcher serving registered bodies.
///
/// A request matches an exact URL first, then the URL with its query removed.
/// Unregistered URLs fail with [`CctvError::Request`].
#[derive(Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Every URL requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let mut bare = url.clone();
        bare.set_query(None);

        self.bodies
            .get(url.as_str())
            .or_else(|| self.bodies.get(bare.as_str()))
            .cloned()
            .ok_or_else(|| CctvError::Request(format!("HTTP 404 for {}", url)).into())
    }
}
