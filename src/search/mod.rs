//! Search backends used to discover candidate echoes of a seed article.
//!
//! Every backend implements [`SearchBackend`]: given a query it returns
//! candidate URLs in the order the upstream engine ranked them. Backends are
//! chosen once at start-up from an [`Engine`] value; the orchestrator only
//! ever talks to the trait.
//!
//! # Supported Engines
//!
//! | Engine | Module | Credentials | Notes |
//! |--------|--------|-------------|-------|
//! | Google Custom Search | [`google`] | API key + engine id | JSON API, max 10 results per call |
//! | GDELT DOC 2.0 | [`gdelt`] | none | expands one sentence into several query variants |
//! | DuckDuckGo | [`duckduckgo`] | none | HTML endpoint, redirect links decoded |
//!
//! # Common Behavior
//!
//! - The shared [`RateLimiter`](crate::rate_limit::RateLimiter) is awaited
//!   before every outbound request, keyed by [`SearchBackend::name`]
//! - Empty queries and a zero result limit are rejected before any request
//! - Transport failures, non-2xx statuses, and unreadable bodies surface as
//!   [`SearchError::Unavailable`]; backends never retry on their own

pub mod duckduckgo;
pub mod gdelt;
pub mod google;
pub mod query;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigError, SearchError};

pub use duckduckgo::DuckDuckGoSearch;
pub use gdelt::GdeltSearch;
pub use google::GoogleSearch;

/// Capability shared by all search engines.
pub trait SearchBackend {
    /// Short engine name, used for rate limiting, logging, and file names.
    fn name(&self) -> &'static str;

    /// Whether the backend wants bare sentences rather than quoted phrases.
    ///
    /// GDELT builds its own phrase/NEAR variants and rejects pre-quoted input.
    fn prefers_unquoted(&self) -> bool {
        false
    }

    /// Run `query` and return up to `max_results` candidate URLs.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError>;
}

/// Engine selector for the CLI and config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Google Custom Search JSON API
    #[value(alias = "a")]
    Google,
    /// GDELT DOC 2.0 article search
    #[default]
    #[value(alias = "b")]
    Gdelt,
    /// DuckDuckGo HTML search
    #[value(name = "duckduckgo", alias = "ddg")]
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Google => "google",
            Engine::Gdelt => "gdelt",
            Engine::DuckDuckGo => "duckduckgo",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject requests no engine can answer.
pub(crate) fn validate_request(query: &str, max_results: usize) -> Result<(), SearchError> {
    if query.trim().is_empty() {
        return Err(ConfigError::invalid("query", "must not be empty").into());
    }
    if max_results == 0 {
        return Err(ConfigError::invalid("max_results", "must be greater than zero").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_names() {
        assert_eq!(Engine::Google.to_string(), "google");
        assert_eq!(Engine::Gdelt.as_str(), "gdelt");
        assert_eq!(Engine::DuckDuckGo.as_str(), "duckduckgo");
        assert_eq!(Engine::default(), Engine::Gdelt);
    }

    #[test]
    fn test_engine_aliases() {
        assert_eq!(Engine::from_str("a", true).unwrap(), Engine::Google);
        assert_eq!(Engine::from_str("B", true).unwrap(), Engine::Gdelt);
        assert_eq!(Engine::from_str("ddg", true).unwrap(), Engine::DuckDuckGo);
    }

    #[test]
    fn test_engine_serde() {
        let e: Engine = serde_yaml::from_str("duckduckgo").unwrap();
        assert_eq!(e, Engine::DuckDuckGo);
        assert_eq!(serde_json::to_string(&Engine::Gdelt).unwrap(), "\"gdelt\"");
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request("alpha", 10).is_ok());
        assert!(matches!(
            validate_request("   ", 10),
            Err(SearchError::Configuration(_))
        ));
        assert!(matches!(
            validate_request("alpha", 0),
            Err(SearchError::Configuration(_))
        ));
    }
}
