//! Google Custom Search JSON API backend.
//!
//! Requires an API key and a programmable search engine id (`cx`). Both are
//! checked when the backend is constructed, so a missing credential fails the
//! run before any request is sent.
//!
//! The API returns at most 10 items per call; larger limits are clamped.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{SearchBackend, validate_request};
use crate::error::{ConfigError, SearchError};
use crate::rate_limit::SharedLimiter;
use crate::utils::truncate_for_log;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const MAX_NUM: usize = 10;

/// Google credentials and endpoint, as read from config/env.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub api_key: Option<String>,
    pub cse_id: Option<String>,
    pub base_url: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            cse_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    link: Option<String>,
}

#[derive(Debug)]
pub struct GoogleSearch {
    client: Client,
    limiter: SharedLimiter,
    api_key: String,
    cse_id: String,
    base_url: String,
}

impl GoogleSearch {
    /// Build the backend, failing fast on missing credentials.
    pub fn new(
        settings: &GoogleSettings,
        client: Client,
        limiter: SharedLimiter,
    ) -> Result<Self, SearchError> {
        let api_key = non_blank(settings.api_key.as_deref())
            .ok_or(ConfigError::MissingCredential("google api key (GOOGLE_API_KEY)"))?;
        let cse_id = non_blank(settings.cse_id.as_deref())
            .ok_or(ConfigError::MissingCredential("google search engine id (GOOGLE_CSE_ID)"))?;

        Ok(Self {
            client,
            limiter,
            api_key,
            cse_id,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl SearchBackend for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
    }

    #[instrument(level = "info", skip(self), fields(engine = "google"))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        validate_request(query, max_results)?;
        let num = max_results.min(MAX_NUM).to_string();
        let endpoint = format!("{}/customsearch/v1", self.base_url);

        self.limiter.wait(self.name()).await;
        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::unavailable("google", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::unavailable("google", e.to_string()))?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 200),
                "Google CSE returned an error"
            );
            let reason = match status.as_u16() {
                429 => "quota or rate limit exceeded (429)".to_string(),
                code => format!("status {code}"),
            };
            return Err(SearchError::unavailable("google", reason));
        }

        let parsed: CseResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::unavailable("google", format!("malformed response: {e}")))?;

        let urls: Vec<String> = parsed
            .items
            .into_iter()
            .filter_map(|item| item.link)
            .take(max_results)
            .collect();

        info!(count = urls.len(), "Google CSE results");
        debug!(urls = ?urls, "Google URLs");
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use httpmock::prelude::*;

    fn settings(base_url: &str) -> GoogleSettings {
        GoogleSettings {
            api_key: Some("key-123".into()),
            cse_id: Some("cx-456".into()),
            base_url: base_url.to_string(),
        }
    }

    fn backend(base_url: &str) -> GoogleSearch {
        GoogleSearch::new(
            &settings(base_url),
            Client::new(),
            RateLimiter::unlimited().shared(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let mut s = settings(DEFAULT_BASE_URL);
        s.api_key = None;
        let err = GoogleSearch::new(&s, Client::new(), RateLimiter::unlimited().shared()).unwrap_err();
        assert!(matches!(
            err,
            SearchError::Configuration(ConfigError::MissingCredential(_))
        ));

        let mut s = settings(DEFAULT_BASE_URL);
        s.cse_id = Some("   ".into());
        assert!(GoogleSearch::new(&s, Client::new(), RateLimiter::unlimited().shared()).is_err());
    }

    #[tokio::test]
    async fn test_search_returns_links_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/customsearch/v1")
                    .query_param("key", "key-123")
                    .query_param("cx", "cx-456")
                    .query_param("q", "\"alpha beta\"")
                    .query_param("num", "10");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(serde_json::json!({
                        "items": [
                            {"link": "https://b.example.com/2"},
                            {"title": "no link"},
                            {"link": "https://a.example.com/1"}
                        ]
                    }));
            })
            .await;

        let urls = backend(&server.base_url())
            .search("\"alpha beta\"", 25)
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://b.example.com/2", "https://a.example.com/1"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_items_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customsearch/v1");
                then.status(200).json_body(serde_json::json!({"kind": "customsearch#search"}));
            })
            .await;

        let urls = backend(&server.base_url()).search("alpha", 5).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customsearch/v1");
                then.status(429).body("rateLimitExceeded");
            })
            .await;

        let err = backend(&server.base_url()).search("alpha", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Unavailable { engine: "google", .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customsearch/v1");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let err = backend(&server.base_url()).search("alpha", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/customsearch/v1");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let err = backend(&server.base_url()).search("", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
        assert_eq!(mock.hits_async().await, 0);
    }
}
