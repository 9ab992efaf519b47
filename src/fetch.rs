//! Page downloading for the seed article and search candidates.
//!
//! [`PageFetcher`] is the seam the orchestrator fetches through; the
//! production implementation is [`HttpFetcher`], tests substitute canned
//! pages. A fetch succeeds only for a 2xx response whose content type looks
//! like HTML or plain text; everything else, timeouts included, is a
//! [`FetchError`].
//!
//! Every fetch waits on the shared limiter under [`PAGE_SERVICE`], so the
//! configured delay separates consecutive page downloads whatever host they
//! target.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::rate_limit::{PAGE_SERVICE, SharedLimiter};
use crate::utils::host_of;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// HTTP client settings shared by the fetcher and the search backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    /// Build a client with a finite request timeout.
    pub fn client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
    }
}

/// Download a page's HTML.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// [`PageFetcher`] over HTTP, rate limited as one service.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: SharedLimiter,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings, limiter: SharedLimiter) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: settings.client()?,
            limiter,
            timeout_secs: settings.timeout_secs,
        })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if host_of(url).is_none() {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        self.limiter.wait(PAGE_SERVICE).await;

        let t0 = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_secs)
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Non-success response");
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !is_textual(&content_type) {
            return Err(FetchError::NotHtml(content_type));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_secs)
            } else {
                FetchError::Http(e)
            }
        })?;
        debug!(
            %url,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Missing content types are given the benefit of the doubt.
fn is_textual(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml")
        || content_type.contains("text/plain")
}
