//! Page retrieval.
//!
//! The crawler only needs page bodies; parsing happens in
//! [`crate::forum::markup`] so that no markup handles are held across awaits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::constants::{CRAWLER_USER_AGENT, FETCH_RETRY_BACKOFF_MS};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("no page at {0}")]
    NotFound(String),
}

impl FetchError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) => false,
        }
    }
}

/// Source of forum pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the body of the page at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be retrieved.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetches pages over HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout and retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, retries: u32) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(CRAWLER_USER_AGENT)
            .build()?;
        Ok(Self { client, retries })
    }

    /// Create a fetcher from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(config.fetch_timeout, config.fetch_retries)
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            debug!(url = %url, attempt, "Fetching page");
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    warn!(url = %url, attempt, "Fetch failed, retrying: {e}");
                    tokio::time::sleep(Duration::from_millis(FETCH_RETRY_BACKOFF_MS)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for &T {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// In-memory pages keyed by URL, for offline crawling and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

impl StaticPages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` as the page at `url`.
    #[must_use]
    pub fn with_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: &str, body: impl Into<String>) {
        let key = Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string());
        self.pages.insert(key, body.into());
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
