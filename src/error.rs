//! Error types for the discovery pipeline and the anomaly detector.
//!
//! Errors are split by the stage that produces them so that the binaries can
//! report *which* stage failed:
//!
//! | Type | Stage | Fatal to a run? |
//! |------|-------|-----------------|
//! | [`ConfigError`] | argument / config validation | yes |
//! | [`FetchError`] | page download | only for the seed |
//! | [`SearchError`] | search backend call | yes |
//! | [`SpiderError`] | orchestrator | yes |
//! | [`AnomalyError`] | anomaly detector I/O | yes |
//!
//! An empty extraction is deliberately *not* an error; see
//! [`crate::spider::CandidateOutcome::Empty`].

use thiserror::Error;

/// Invalid or missing configuration. Always raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// A page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("not an HTML page (content-type: {0})")]
    NotHtml(String),
}

/// A search backend call failed.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend misconfigured: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{engine} search unavailable: {reason}")]
    Unavailable { engine: &'static str, reason: String },
}

impl SearchError {
    pub fn unavailable(engine: &'static str, reason: impl Into<String>) -> Self {
        SearchError::Unavailable {
            engine,
            reason: reason.into(),
        }
    }
}

/// Fatal failures of a spider run. The display text names the failing stage.
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("seed fetch failed for {url}: {source}")]
    SeedFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("seed fetch failed for {url}: no article text could be extracted")]
    SeedEmpty { url: String },

    #[error("search failed: {0}")]
    SearchUnavailable(#[source] SearchError),

    #[error("failed to persist match set to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize match set: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SearchError> for SpiderError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::Configuration(c) => SpiderError::Configuration(c),
            other => SpiderError::SearchUnavailable(other),
        }
    }
}

/// Failures while loading match sets or writing the anomaly report.
#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize anomaly report: {0}")]
    Serialize(#[from] serde_json::Error),
}
