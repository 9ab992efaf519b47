//! GDELT DOC 2.0 API backend.
//!
//! GDELT is picky about long or punctuation-heavy queries, so a seed sentence
//! is never sent verbatim. It is reduced to a handful of keywords (proper
//! nouns and allow-listed acronyms first, stop words and tiny tokens dropped)
//! and expanded into up to three variants:
//!
//! 1. `near10:"w1 w2 w3" w4 w5 w6 sourcelang:english`
//! 2. `"w1 w2" w4 w5 sourcelang:english`
//! 3. `w1 w2 w3 w4 ... sourcelang:english`
//!
//! Results of all variants are unioned in order until the limit is reached.
//!
//! When GDELT rejects a query it answers `200` with a short HTML explanation
//! instead of JSON. The explanation is inspected and the query repaired
//! (NEAR clause dropped, short tokens dropped, or the query quoted) and sent
//! again, at most [`MAX_REPAIRS`] times. A variant that cannot be repaired
//! contributes no results; it does not fail the search.

use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::{SearchBackend, validate_request};
use crate::error::{ConfigError, SearchError};
use crate::rate_limit::SharedLimiter;
use crate::similarity::STOP_WORDS;
use crate::utils::truncate_for_log;

pub const DEFAULT_BASE_URL: &str = "https://api.gdeltproject.org";
const MAX_RECORDS: usize = 250;
const MAX_REPAIRS: usize = 2;

/// Short tokens that are still meaningful search terms.
const ACRONYM_ALLOW: &[&str] = &["EU", "UK", "UN", "US"];

static TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9\-]+").expect("static term regex"));
static NEAR_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bnear\d+:"[^"]+"\s*"#).expect("static near regex"));

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GdeltSettings {
    pub base_url: String,
    /// Relative window such as `30d`, `7d`, `1week`; ignored when a start or end is set.
    pub timespan: String,
    /// `YYYYMMDDHHMMSS`, `YYYYMMDD`, or `YYYY-MM-DD`.
    pub start: Option<String>,
    pub end: Option<String>,
    pub near_distance: usize,
    pub max_terms: usize,
    pub source_lang: Option<String>,
}

impl Default for GdeltSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timespan: "30d".to_string(),
            start: None,
            end: None,
            near_distance: 10,
            max_terms: 8,
            source_lang: Some("english".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DocResponse {
    #[serde(default)]
    articles: Vec<DocArticle>,
}

#[derive(Debug, Deserialize)]
struct DocArticle {
    url: Option<String>,
}

#[derive(Debug)]
pub struct GdeltSearch {
    client: Client,
    limiter: SharedLimiter,
    settings: GdeltSettings,
    window: Vec<(&'static str, String)>,
}

impl GdeltSearch {
    /// Build the backend; the date window is validated here.
    pub fn new(
        settings: GdeltSettings,
        client: Client,
        limiter: SharedLimiter,
    ) -> Result<Self, SearchError> {
        let mut window = Vec::new();
        if settings.start.is_some() || settings.end.is_some() {
            if let Some(start) = &settings.start {
                window.push(("STARTDATETIME", format_datetime(start)?));
            }
            if let Some(end) = &settings.end {
                window.push(("ENDDATETIME", format_datetime(end)?));
            }
        } else {
            if settings.timespan.trim().is_empty() {
                return Err(ConfigError::invalid("gdelt timespan", "must not be empty").into());
            }
            window.push(("timespan", settings.timespan.trim().to_string()));
        }

        Ok(Self {
            client,
            limiter,
            settings: GdeltSettings {
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                ..settings
            },
            window,
        })
    }

    /// Query variants for one sentence; see the module docs.
    pub fn build_queries(&self, sentence: &str) -> Vec<String> {
        build_queries(
            sentence,
            self.settings.near_distance,
            self.settings.max_terms,
            self.settings.source_lang.as_deref(),
        )
    }

    /// One DOC API call, repairing the query when GDELT explains a rejection.
    async fn search_single(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let endpoint = format!("{}/api/v2/doc/doc", self.settings.base_url);
        let max_records = max_results.clamp(1, MAX_RECORDS).to_string();
        let mut query = query.to_string();

        for _ in 0..=MAX_REPAIRS {
            let mut params: Vec<(&str, &str)> = vec![
                ("query", query.as_str()),
                ("mode", "artlist"),
                ("format", "json"),
                ("maxrecords", max_records.as_str()),
                ("sort", "datedesc"),
            ];
            params.extend(self.window.iter().map(|(k, v)| (*k, v.as_str())));

            self.limiter.wait(self.name()).await;
            let response = self
                .client
                .get(&endpoint)
                .query(&params)
                .send()
                .await
                .map_err(|e| SearchError::unavailable("gdelt", e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let reason = match status.as_u16() {
                    429 => "rate limited (429)".to_string(),
                    code => format!("status {code}"),
                };
                return Err(SearchError::unavailable("gdelt", reason));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_lowercase();
            let body = response
                .text()
                .await
                .map_err(|e| SearchError::unavailable("gdelt", e.to_string()))?;

            if content_type.contains("json") {
                if body.trim().is_empty() {
                    return Ok(Vec::new());
                }
                let parsed: DocResponse = serde_json::from_str(&body).map_err(|e| {
                    SearchError::unavailable("gdelt", format!("malformed response: {e}"))
                })?;
                return Ok(parsed.articles.into_iter().filter_map(|a| a.url).collect());
            }

            let head = truncate_for_log(&body.replace('\n', " "), 240);
            warn!(%query, %head, "GDELT returned a non-JSON explanation");
            match repair_query(&query, &head) {
                Some(fixed) if fixed != query => {
                    info!(from = %query, to = %fixed, "Retrying GDELT with repaired query");
                    query = fixed;
                }
                _ => return Ok(Vec::new()),
            }
        }

        warn!(%query, "GDELT query still rejected after repairs");
        Ok(Vec::new())
    }
}

impl SearchBackend for GdeltSearch {
    fn name(&self) -> &'static str {
        "gdelt"
    }

    fn prefers_unquoted(&self) -> bool {
        true
    }

    #[instrument(level = "info", skip(self), fields(engine = "gdelt"))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        validate_request(query, max_results)?;

        let mut urls = Vec::new();
        let mut seen = HashSet::new();
        for variant in self.build_queries(query.trim_matches('"')) {
            let hits = self.search_single(&variant, max_results).await?;
            debug!(%variant, hits = hits.len(), "GDELT variant results");
            for url in hits {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
                if urls.len() >= max_results {
                    info!(count = urls.len(), "GDELT results");
                    return Ok(urls);
                }
            }
        }

        info!(count = urls.len(), "GDELT results");
        Ok(urls)
    }
}

/// Convert accepted date inputs to GDELT's `YYYYMMDDHHMMSS`.
pub fn format_datetime(input: &str) -> Result<String, ConfigError> {
    let s = input.trim();
    let all_digits = s.chars().all(|c| c.is_ascii_digit());

    let formatted = if all_digits && s.len() == 14 {
        Some(s.to_string())
    } else if all_digits && s.len() == 8 {
        Some(format!("{s}000000"))
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y%m%d000000").to_string())
    };

    formatted.ok_or_else(|| {
        ConfigError::invalid(
            "gdelt datetime",
            format!("unsupported format {input:?}; use YYYYMMDDHHMMSS, YYYYMMDD or YYYY-MM-DD"),
        )
    })
}

/// Unique keywords of a sentence, stop words and short tokens removed.
fn keywords(sentence: &str) -> Vec<String> {
    let normalized = sentence
        .replace('\u{2019}', "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace('\u{a0}', " ");

    let mut seen = HashSet::new();
    TERM.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t.to_lowercase().as_str()))
        .filter(|t| t.len() >= 3 || ACRONYM_ALLOW.contains(&t.to_uppercase().as_str()))
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

fn build_queries(
    sentence: &str,
    near_distance: usize,
    max_terms: usize,
    source_lang: Option<&str>,
) -> Vec<String> {
    let terms: Vec<String> = keywords(sentence).into_iter().take(max_terms).collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let is_named = |t: &String| {
        t.chars().next().is_some_and(char::is_uppercase) || t.chars().all(|c| !c.is_lowercase())
    };
    let (named, others): (Vec<String>, Vec<String>) = terms.into_iter().partition(is_named);
    let core: Vec<String> = named.into_iter().chain(others).take(max_terms).collect();

    let head = &core[..core.len().min(3)];
    let tail: Vec<&str> = core
        .iter()
        .skip(3)
        .filter(|t| t.len() >= 3)
        .take(3)
        .map(String::as_str)
        .collect();
    let filters: Vec<String> = source_lang
        .map(|lang| vec![format!("sourcelang:{lang}")])
        .unwrap_or_default();

    let mut variants = Vec::new();
    variants.push(format!(
        "near{near_distance}:\"{}\" {} {}",
        head.join(" "),
        tail.join(" "),
        filters.join(" ")
    ));
    if head.len() >= 2 {
        variants.push(format!(
            "\"{}\" {} {}",
            head[..2].join(" "),
            tail.iter().take(2).join(" "),
            filters.join(" ")
        ));
    }
    let bag: Vec<&str> = core.iter().filter(|t| t.len() >= 3).map(String::as_str).collect();
    if !bag.is_empty() {
        variants.push(format!("{} {}", bag.join(" "), filters.join(" ")));
    }

    variants
        .into_iter()
        .map(|q| q.split_whitespace().join(" "))
        .filter(|q| !q.is_empty())
        .unique()
        .collect()
}

/// Small, targeted fixes for the rejection reasons GDELT explains.
fn repair_query(query: &str, explanation: &str) -> Option<String> {
    let msg = explanation.to_lowercase();

    if msg.contains("invalid near") || msg.contains("near search") {
        let fixed = NEAR_CLAUSE.replace_all(query, "").trim().to_string();
        return (!fixed.is_empty()).then_some(fixed);
    }

    if msg.contains("too short") {
        let fixed = query
            .split_whitespace()
            .filter(|t| (t.starts_with('"') && t.ends_with('"') && t.len() > 1) || t.len() >= 3)
            .join(" ");
        return (!fixed.is_empty()).then_some(fixed);
    }

    if msg.contains("illegal character") && !(query.starts_with('"') && query.ends_with('"')) {
        return Some(format!("\"{query}\""));
    }

    None
}
