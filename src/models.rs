//! Data models for seed articles, scored candidates, and reuse statistics.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SeedArticle`]: The article whose propagation is being traced
//! - [`Candidate`]: A fetched search result waiting to be scored
//! - [`Match`] / [`MatchSet`]: Accepted candidates, persisted once per spider run
//! - [`DomainReuseStat`] / [`AnomalyFlag`]: Views derived from one or more match sets
//! - [`ContentReuse`] / [`ReuseSource`]: Matches grouped by snippet content hash
//!
//! Only [`MatchSet`] (and the [`AnomalyFlag`] report) is ever written to disk.
//! Everything else lives for the duration of a single run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::domain_parts;

/// The article whose narrative is being traced.
///
/// Created once per run from the seed URL and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SeedArticle {
    /// The seed URL as supplied on the command line.
    pub url: String,
    /// Case-preserving article text, used to build search queries.
    pub raw_text: String,
    /// Text normalized for comparison.
    pub normalized_text: String,
    /// When the seed was downloaded.
    pub fetched_at: DateTime<Utc>,
}

/// A search result that has been fetched but not yet accepted.
#[derive(Debug)]
pub struct Candidate {
    pub url: String,
    pub raw_html: String,
    pub raw_text: String,
    pub normalized_text: String,
}

/// A candidate whose similarity to the seed reached the run's threshold.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Match {
    /// URL the matching article was found at.
    pub url: String,
    /// Registrable domain, e.g. `example.co.uk`.
    pub domain: String,
    /// Full host without a leading `www.`, e.g. `news.example.co.uk`.
    pub subdomain: String,
    /// Similarity to the seed, in `[threshold, 1.0]`.
    pub similarity_score: f64,
    /// Leading excerpt of the candidate's text.
    pub snippet: String,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    /// Build a match for `url`, deriving the domain/subdomain from its host.
    ///
    /// URLs without a host fall back to the raw string for both fields so the
    /// match is still attributable when it is aggregated later.
    pub fn new(url: &str, similarity_score: f64, snippet: String) -> Self {
        let (domain, subdomain) =
            domain_parts(url).unwrap_or_else(|| (url.to_string(), url.to_string()));
        Self {
            url: url.to_string(),
            domain,
            subdomain,
            similarity_score,
            snippet,
            matched_at: Utc::now(),
        }
    }
}

/// All matches from one spider run.
///
/// Persisted as `matches_<engine>.json`; matches keep discovery order unless
/// the run was configured to sort them by score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchSet {
    pub seed_url: String,
    pub engine: String,
    pub threshold: f64,
    pub matches: Vec<Match>,
}

impl MatchSet {
    pub fn new(seed_url: &str, engine: &str, threshold: f64) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            engine: engine.to_string(),
            threshold,
            matches: Vec::new(),
        }
    }

    /// File name the set is persisted under.
    pub fn file_name(&self) -> String {
        format!("matches_{}.json", self.engine)
    }
}

/// Reuse statistics for one registrable domain, aggregated across match sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainReuseStat {
    pub domain: String,
    pub subdomain_count: usize,
    /// Distinct matching URLs on this domain.
    pub match_count: usize,
    pub subdomains: BTreeSet<String>,
}

/// Verdict for one domain produced by the anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyFlag {
    pub domain: String,
    pub subdomain_cluster_size: usize,
    /// Subdomain count relative to the population baseline.
    pub reuse_ratio: f64,
    pub flagged: bool,
}

/// One place a hashed snippet was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReuseSource {
    pub domain: String,
    pub url: String,
    pub seed_url: String,
    pub engine: String,
}

/// Matches whose snippets hash to the same content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentReuse {
    /// Hex SHA-256 of the whitespace-normalized snippet prefix.
    pub content_hash: String,
    pub representative_snippet: String,
    pub domain_count: usize,
    /// Seen on two or more registrable domains.
    pub cross_domain: bool,
    pub sources: Vec<ReuseSource>,
}
