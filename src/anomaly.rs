//! Reuse anomaly detection over persisted match sets.
//!
//! Matches are grouped by registrable domain. For each domain we count the
//! distinct subdomains content appeared on and the distinct matching URLs.
//! A domain is flagged when its count sits well above the population
//! baseline; with a single domain publishing the same story across many
//! subdomains, that is the pattern of a content farm or syndication network.
//!
//! # Statistics
//!
//! | [`Statistic`] | Baseline | Threshold |
//! |---------------|----------|-----------|
//! | `median` (default) | median of counts | `factor * median` |
//! | `mean-stddev` | mean of counts | `mean + factor * stddev` |
//!
//! A domain is flagged when its count is strictly greater than the threshold.
//! Below `min_domains` domains no baseline is meaningful and nothing is
//! reported.
//!
//! # Content reuse map
//!
//! [`reuse_map`] groups matches by a SHA-256 hash of their snippet, so the
//! same text lifted onto unrelated domains shows up as one cluster. Clusters
//! spanning two or more registrable domains are marked `cross_domain`.
//!
//! Detection never touches the network; [`detect`] is a pure function of its
//! input, so repeated runs over the same files give identical flags.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::{AnomalyError, ConfigError};
use crate::models::{AnomalyFlag, ContentReuse, DomainReuseStat, MatchSet, ReuseSource};
use crate::utils::{looks_truncated, normalize_url, take_chars};

/// Snippet characters that feed the content hash.
const HASH_CHARS: usize = 1000;
const REPRESENTATIVE_CHARS: usize = 200;

/// How the population baseline is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Statistic {
    #[default]
    Median,
    MeanStddev,
}

/// Which per-domain count is compared against the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReuseMetric {
    Subdomains,
    Matches,
    /// Flag when either count is anomalous.
    #[default]
    Either,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyConfig {
    pub statistic: Statistic,
    pub metric: ReuseMetric,
    pub factor: f64,
    pub min_domains: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            statistic: Statistic::Median,
            metric: ReuseMetric::Either,
            factor: 3.0,
            min_domains: 3,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.factor.is_finite() && self.factor >= 0.0) {
            return Err(ConfigError::invalid(
                "factor",
                format!("{} must be a non-negative number", self.factor),
            ));
        }
        if self.min_domains == 0 {
            return Err(ConfigError::invalid("min_domains", "must be at least 1"));
        }
        Ok(())
    }
}

/// Everything written to the analysis file.
#[derive(Debug, Serialize)]
pub struct AnomalyReport {
    pub generated_at: DateTime<Utc>,
    pub config: AnomalyConfig,
    pub match_sets: usize,
    pub domains: usize,
    pub flagged: usize,
    pub stats: Vec<DomainReuseStat>,
    pub flags: Vec<AnomalyFlag>,
    /// Number of `reuse_map` clusters spanning two or more domains.
    pub cross_domain_reuse: usize,
    pub reuse_map: Vec<ContentReuse>,
}

impl AnomalyReport {
    pub fn build(match_sets: &[MatchSet], config: &AnomalyConfig) -> Self {
        let stats = aggregate(match_sets);
        let flags = detect_from_stats(&stats, config);
        let reuse_map = reuse_map(match_sets);
        Self {
            generated_at: Utc::now(),
            config: config.clone(),
            match_sets: match_sets.len(),
            domains: stats.len(),
            flagged: flags.iter().filter(|f| f.flagged).count(),
            stats,
            flags,
            cross_domain_reuse: reuse_map.iter().filter(|c| c.cross_domain).count(),
            reuse_map,
        }
    }
}

/// Per-domain subdomain and distinct-URL counts, sorted by domain.
pub fn aggregate(match_sets: &[MatchSet]) -> Vec<DomainReuseStat> {
    let mut by_domain: BTreeMap<&str, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();

    for m in match_sets.iter().flat_map(|set| &set.matches) {
        let (subdomains, urls) = by_domain.entry(m.domain.as_str()).or_default();
        subdomains.insert(m.subdomain.clone());
        urls.insert(normalize_url(&m.url));
    }

    by_domain
        .into_iter()
        .map(|(domain, (subdomains, urls))| DomainReuseStat {
            domain: domain.to_string(),
            subdomain_count: subdomains.len(),
            match_count: urls.len(),
            subdomains,
        })
        .collect()
}

/// Group matches by the hash of their snippet.
///
/// Whitespace is collapsed before hashing and only the first 1000 characters
/// count, so trailing boilerplate does not split a cluster. Empty snippets are
/// skipped, and a URL reached through several match sets is listed once.
/// Clusters are ordered by domain count, largest first, then by hash.
pub fn reuse_map(match_sets: &[MatchSet]) -> Vec<ContentReuse> {
    let mut by_hash: BTreeMap<String, (String, Vec<ReuseSource>, BTreeSet<String>)> =
        BTreeMap::new();

    for set in match_sets {
        for m in &set.matches {
            let text = m.snippet.split_whitespace().join(" ");
            if text.is_empty() {
                continue;
            }
            let hash = hex::encode(Sha256::digest(take_chars(&text, HASH_CHARS).as_bytes()));
            let (_, sources, urls) = by_hash
                .entry(hash)
                .or_insert_with(|| (take_chars(&text, REPRESENTATIVE_CHARS), Vec::new(), BTreeSet::new()));
            if urls.insert(normalize_url(&m.url)) {
                sources.push(ReuseSource {
                    domain: m.domain.clone(),
                    url: m.url.clone(),
                    seed_url: set.seed_url.clone(),
                    engine: set.engine.clone(),
                });
            }
        }
    }

    let mut clusters: Vec<ContentReuse> = by_hash
        .into_iter()
        .map(|(content_hash, (representative_snippet, sources, _))| {
            let domain_count = sources.iter().map(|s| s.domain.as_str()).unique().count();
            ContentReuse {
                content_hash,
                representative_snippet,
                domain_count,
                cross_domain: domain_count >= 2,
                sources,
            }
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.domain_count
            .cmp(&a.domain_count)
            .then_with(|| a.content_hash.cmp(&b.content_hash))
    });
    debug!(
        clusters = clusters.len(),
        cross_domain = clusters.iter().filter(|c| c.cross_domain).count(),
        "Built content reuse map"
    );
    clusters
}

/// One flag per domain, sorted by domain; empty below `min_domains`.
pub fn detect(match_sets: &[MatchSet], config: &AnomalyConfig) -> Vec<AnomalyFlag> {
    detect_from_stats(&aggregate(match_sets), config)
}

fn detect_from_stats(stats: &[DomainReuseStat], config: &AnomalyConfig) -> Vec<AnomalyFlag> {
    if stats.len() < config.min_domains {
        info!(
            domains = stats.len(),
            min_domains = config.min_domains,
            "Too few domains for a baseline; nothing flagged"
        );
        return Vec::new();
    }

    let subdomains: Vec<f64> = stats.iter().map(|s| s.subdomain_count as f64).collect();
    let matches: Vec<f64> = stats.iter().map(|s| s.match_count as f64).collect();
    let (sub_center, sub_limit) = baseline(&subdomains, config.statistic, config.factor);
    let (_, match_limit) = baseline(&matches, config.statistic, config.factor);
    debug!(sub_center, sub_limit, match_limit, "Baselines");

    stats
        .iter()
        .map(|s| {
            let sub_hit = s.subdomain_count as f64 > sub_limit;
            let match_hit = s.match_count as f64 > match_limit;
            let flagged = match config.metric {
                ReuseMetric::Subdomains => sub_hit,
                ReuseMetric::Matches => match_hit,
                ReuseMetric::Either => sub_hit || match_hit,
            };
            if flagged {
                info!(domain = %s.domain, subdomains = s.subdomain_count, matches = s.match_count, "Flagged domain");
            }
            AnomalyFlag {
                domain: s.domain.clone(),
                subdomain_cluster_size: s.subdomain_count,
                reuse_ratio: if sub_center > 0.0 {
                    s.subdomain_count as f64 / sub_center
                } else {
                    0.0
                },
                flagged,
            }
        })
        .collect()
}

/// `(center, limit)` for a non-empty population.
fn baseline(values: &[f64], statistic: Statistic, factor: f64) -> (f64, f64) {
    match statistic {
        Statistic::Median => {
            let m = median(values);
            (m, factor * m)
        }
        Statistic::MeanStddev => {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            (mean, mean + factor * var.sqrt())
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Expand inputs into match set files: files are kept as given, directories
/// contribute their `matches_*.json` entries in name order.
pub async fn discover_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, AnomalyError> {
    let mut files = Vec::new();
    for input in inputs {
        let meta = fs::metadata(input).await.map_err(|source| AnomalyError::Io {
            path: input.display().to_string(),
            source,
        })?;
        if !meta.is_dir() {
            files.push(input.clone());
            continue;
        }

        let mut found = Vec::new();
        let mut entries = fs::read_dir(input).await.map_err(|source| AnomalyError::Io {
            path: input.display().to_string(),
            source,
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|source| AnomalyError::Io {
            path: input.display().to_string(),
            source,
        })? {
            let path = entry.path();
            if is_match_set_file(&path) {
                found.push(path);
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_match_set_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("matches_") && n.ends_with(".json"))
}

/// Load every match set under `inputs`.
///
/// Unreadable JSON is skipped with a warning; a file that ends mid-document
/// is most likely still being written by a spider run.
#[instrument(level = "info", skip_all, fields(inputs = inputs.len()))]
pub async fn load_match_sets(inputs: &[PathBuf]) -> Result<Vec<MatchSet>, AnomalyError> {
    let files = discover_files(inputs).await?;
    info!(files = files.len(), "Loading match sets");

    let loaded: Vec<Result<Option<MatchSet>, AnomalyError>> = stream::iter(files)
        .then(|path| async move { load_one(&path).await })
        .collect()
        .await;

    let mut sets = Vec::new();
    for set in loaded {
        if let Some(set) = set? {
            sets.push(set);
        }
    }
    Ok(sets)
}

async fn load_one(path: &Path) -> Result<Option<MatchSet>, AnomalyError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| AnomalyError::Io {
            path: path.display().to_string(),
            source,
        })?;

    match serde_json::from_str::<MatchSet>(&text) {
        Ok(set) => {
            debug!(path = %path.display(), matches = set.matches.len(), "Loaded match set");
            Ok(Some(set))
        }
        Err(e) if looks_truncated(&e) => {
            warn!(path = %path.display(), error = %e, "Match set looks truncated (possibly still being written); skipping");
            Ok(None)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed match set; skipping");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Match;

    fn set_with(urls: &[&str]) -> MatchSet {
        let mut set = MatchSet::new("https://seed.example.com/a", "google", 0.8);
        for url in urls {
            set.matches.push(Match::new(url, 0.9, String::new()));
        }
        set
    }

    /// Three domains seen once, two spread over ten subdomains each.
    fn farm_population() -> Vec<MatchSet> {
        let mut urls = vec![
            "https://one.example/a".to_string(),
            "https://two.example/a".to_string(),
            "https://three.example/a".to_string(),
        ];
        for farm in ["farm-a.com", "farm-b.net"] {
            for i in 0..10 {
                urls.push(format!("https://s{i}.{farm}/story"));
            }
        }
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        vec![set_with(&refs)]
    }

    #[test]
    fn test_aggregate_counts_subdomains_and_distinct_urls() {
        let sets = vec![
            set_with(&["https://a.example.com/1", "https://b.example.com/1"]),
            set_with(&["https://a.example.com/1", "https://www.a.example.com/2"]),
        ];
        let stats = aggregate(&sets);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].domain, "example.com");
        assert_eq!(stats[0].subdomain_count, 2);
        assert_eq!(stats[0].match_count, 3);
    }

    #[test]
    fn test_median_flags_only_farms() {
        let flags = detect(&farm_population(), &AnomalyConfig::default());
        assert_eq!(flags.len(), 5);

        let flagged: Vec<&str> = flags
            .iter()
            .filter(|f| f.flagged)
            .map(|f| f.domain.as_str())
            .collect();
        assert_eq!(flagged, vec!["farm-a.com", "farm-b.net"]);

        let farm = flags.iter().find(|f| f.domain == "farm-a.com").unwrap();
        assert_eq!(farm.subdomain_cluster_size, 10);
        assert_eq!(farm.reuse_ratio, 10.0);
    }

    #[test]
    fn test_mean_stddev_flags_only_farms() {
        let config = AnomalyConfig {
            statistic: Statistic::MeanStddev,
            factor: 1.0,
            ..Default::default()
        };
        let flagged: Vec<String> = detect(&farm_population(), &config)
            .into_iter()
            .filter(|f| f.flagged)
            .map(|f| f.domain)
            .collect();
        assert_eq!(flagged, vec!["farm-a.com", "farm-b.net"]);
    }

    #[test]
    fn test_below_min_population_reports_nothing() {
        let sets = vec![set_with(&[
            "https://s1.big.com/a",
            "https://s2.big.com/a",
            "https://s3.big.com/a",
            "https://one.example/a",
        ])];
        assert!(detect(&sets, &AnomalyConfig::default()).is_empty());
        assert!(detect(&[], &AnomalyConfig::default()).is_empty());
    }

    #[test]
    fn test_uniform_population_flags_nothing() {
        let sets = vec![set_with(&[
            "https://a.one.com/x",
            "https://a.two.com/x",
            "https://a.three.com/x",
            "https://a.four.com/x",
        ])];
        let flags = detect(&sets, &AnomalyConfig::default());
        assert_eq!(flags.len(), 4);
        assert!(flags.iter().all(|f| !f.flagged && f.reuse_ratio == 1.0));
    }

    #[test]
    fn test_metric_selection() {
        // one.com has many URLs on a single subdomain
        let mut urls: Vec<String> = (0..10).map(|i| format!("https://www.one.com/{i}")).collect();
        urls.extend(["https://two.com/a", "https://three.com/a", "https://four.com/a"].map(String::from));
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let sets = vec![set_with(&refs)];

        let by = |metric| {
            let config = AnomalyConfig {
                metric,
                ..Default::default()
            };
            detect(&sets, &config).into_iter().filter(|f| f.flagged).count()
        };
        assert_eq!(by(ReuseMetric::Subdomains), 0);
        assert_eq!(by(ReuseMetric::Matches), 1);
        assert_eq!(by(ReuseMetric::Either), 1);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let sets = farm_population();
        let config = AnomalyConfig::default();
        assert_eq!(detect(&sets, &config), detect(&sets, &config));
    }

    #[test]
    fn test_median_even_population() {
        assert_eq!(median(&[1.0, 3.0, 2.0, 10.0]), 2.5);
        assert_eq!(median(&[4.0]), 4.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(AnomalyConfig::default().validate().is_ok());
        let bad = AnomalyConfig {
            factor: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = AnomalyConfig {
            min_domains: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_skips_truncated_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = set_with(&["https://a.example.com/1"]);
        let json = serde_json::to_string(&good).unwrap();
        std::fs::write(dir.path().join("matches_google.json"), &json).unwrap();
        std::fs::write(dir.path().join("matches_gdelt.json"), &json[..json.len() / 2]).unwrap();
        std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let sets = load_match_sets(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(sets, vec![good]);
    }

    #[tokio::test]
    async fn test_load_skips_malformed_match_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("matches_google.json"), r#"{"seed_url": 7}"#).unwrap();

        let sets = load_match_sets(&[dir.path().to_path_buf()]).await.unwrap();
        assert!(sets.is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_is_error() {
        let err = load_match_sets(&[PathBuf::from("/no/such/dir")])
            .await
            .unwrap_err();
        assert!(matches!(err, AnomalyError::Io { .. }));
    }

    fn snippet_set(engine: &str, entries: &[(&str, &str)]) -> MatchSet {
        let mut set = MatchSet::new("https://seed.example.com/a", engine, 0.8);
        for (url, snippet) in entries {
            set.matches.push(Match::new(url, 0.9, snippet.to_string()));
        }
        set
    }

    #[test]
    fn test_reuse_map_groups_identical_snippets_across_domains() {
        let story = "Flooding forced thousands to leave their homes overnight.";
        let sets = vec![
            snippet_set(
                "google",
                &[
                    ("https://news.one.com/a", story),
                    ("https://blog.two.net/b", "Flooding forced thousands\n to leave  their homes overnight."),
                    ("https://three.org/c", "An unrelated story about football."),
                ],
            ),
            // same URL again from another engine, plus an empty snippet
            snippet_set("gdelt", &[("https://news.one.com/a", story), ("https://four.org/d", "  ")]),
        ];

        let map = reuse_map(&sets);
        assert_eq!(map.len(), 2);

        let shared = &map[0];
        assert!(shared.cross_domain);
        assert_eq!(shared.domain_count, 2);
        assert_eq!(shared.representative_snippet, story);
        assert_eq!(shared.content_hash.len(), 64);
        let urls: Vec<&str> = shared.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://news.one.com/a", "https://blog.two.net/b"]);

        assert!(!map[1].cross_domain);
        assert_eq!(map[1].sources[0].domain, "three.org");
    }

    #[test]
    fn test_reuse_map_same_domain_is_not_cross_domain() {
        let text = "Identical paragraph syndicated across one network.";
        let sets = vec![snippet_set(
            "google",
            &[("https://a.farm.com/x", text), ("https://b.farm.com/x", text)],
        )];

        let map = reuse_map(&sets);
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].sources.len(), 2);
        assert_eq!(map[0].domain_count, 1);
        assert!(!map[0].cross_domain);
    }

    #[test]
    fn test_reuse_map_hashes_only_the_snippet_prefix() {
        let base = "word ".repeat(250);
        let sets = vec![snippet_set(
            "google",
            &[
                ("https://one.com/a", format!("{base}tail one").as_str()),
                ("https://two.com/a", format!("{base}different tail").as_str()),
            ],
        )];

        let map = reuse_map(&sets);
        assert_eq!(map.len(), 1);
        assert!(map[0].cross_domain);
        assert_eq!(map[0].representative_snippet.chars().count(), 200);
    }

    #[test]
    fn test_report_counts() {
        let report = AnomalyReport::build(&farm_population(), &AnomalyConfig::default());
        assert_eq!(report.match_sets, 1);
        assert_eq!(report.domains, 5);
        assert_eq!(report.flagged, 2);
        assert_eq!(report.stats.len(), 5);
        // farm_population has no snippets
        assert!(report.reuse_map.is_empty());
        assert_eq!(report.cross_domain_reuse, 0);
    }
}
