//! Spider orchestration: one seed article in, one persisted match set out.
//!
//! A run moves through four stages:
//!
//! | Stage | Work | On failure |
//! |-------|------|------------|
//! | `FETCH_SEED` | download and extract the seed | run aborts |
//! | `SEARCH` | turn seed sentences into queries, collect unique URLs | run aborts |
//! | `EVALUATE` | fetch, extract, and score each candidate | candidate skipped |
//! | `PERSIST` | write `matches_<engine>.json` | run aborts |
//!
//! Candidates are evaluated one at a time in discovery order, so with a
//! deterministic backend and fetcher two runs produce the same matches.
//! The seed URL itself is never a candidate, and every URL is fetched and
//! scored at most once per run.

use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{ConfigError, FetchError, SpiderError};
use crate::extract::ContentExtractor;
use crate::fetch::PageFetcher;
use crate::models::{Candidate, Match, MatchSet, SeedArticle};
use crate::outputs::json::write_match_set;
use crate::search::SearchBackend;
use crate::search::query::{opening_words, quote, top_sentences};
use crate::similarity;
use crate::utils::{normalize_url, take_chars, truncate_for_log};

/// Characters of candidate text kept as a match snippet.
pub const SNIPPET_CHARS: usize = 500;

/// Tunables for a single run; see [`crate::config::SpiderConfig`].
#[derive(Debug, Clone)]
pub struct SpiderOptions {
    pub threshold: f64,
    pub max_results: usize,
    pub query_count: usize,
    pub query_max_words: usize,
    /// Candidates with less extracted text than this are not scored.
    pub min_candidate_chars: usize,
    pub sort_by_score: bool,
    pub output_dir: PathBuf,
}

impl Default for SpiderOptions {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            max_results: 10,
            query_count: 5,
            query_max_words: 20,
            min_candidate_chars: 100,
            sort_by_score: false,
            output_dir: PathBuf::from("data/crawled"),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub queries: usize,
    /// URLs returned by the backend, before filtering.
    pub results: usize,
    /// Unique URLs that went on to evaluation.
    pub candidates: usize,
    pub duplicates: usize,
    pub self_matches: usize,
    pub skipped: usize,
    pub empty: usize,
    pub too_short: usize,
    pub rejected: usize,
    pub accepted: usize,
}

/// What happened to one candidate URL.
#[derive(Debug)]
pub enum CandidateOutcome {
    Accepted(Match),
    Rejected { score: f64 },
    /// Extraction produced no text.
    Empty,
    TooShort { chars: usize },
    /// The page could not be fetched.
    Skipped(FetchError),
}

/// Result of a completed run.
#[derive(Debug)]
pub struct SpiderReport {
    pub match_set: MatchSet,
    pub stats: RunStats,
    pub path: PathBuf,
}

pub struct Spider<B, F> {
    backend: B,
    fetcher: F,
    extractor: ContentExtractor,
    options: SpiderOptions,
}

impl<B: SearchBackend, F: PageFetcher> Spider<B, F> {
    pub fn new(
        backend: B,
        fetcher: F,
        extractor: ContentExtractor,
        options: SpiderOptions,
    ) -> Result<Self, SpiderError> {
        if !(options.threshold > 0.0 && options.threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "threshold",
                format!("{} is outside (0, 1]", options.threshold),
            )
            .into());
        }
        if options.max_results == 0 {
            return Err(ConfigError::invalid("max_results", "must be greater than zero").into());
        }
        Ok(Self {
            backend,
            fetcher,
            extractor,
            options,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run every stage and persist the match set.
    #[instrument(level = "info", skip(self), fields(engine = self.backend.name()))]
    pub async fn run(&self, seed_url: &str) -> Result<SpiderReport, SpiderError> {
        let (match_set, stats) = self.collect(seed_url).await?;
        let path = write_match_set(&match_set, &self.options.output_dir).await?;
        info!(
            matches = match_set.matches.len(),
            path = %path.display(),
            ?stats,
            "Spider run complete"
        );
        Ok(SpiderReport {
            match_set,
            stats,
            path,
        })
    }

    /// Run every stage except `PERSIST`.
    pub async fn collect(&self, seed_url: &str) -> Result<(MatchSet, RunStats), SpiderError> {
        let mut stats = RunStats::default();

        let seed = self.fetch_seed(seed_url).await?;
        let urls = self.discover(&seed, &mut stats).await?;
        stats.candidates = urls.len();
        info!(candidates = urls.len(), "Evaluating candidates");

        let mut match_set =
            MatchSet::new(seed_url, self.backend.name(), self.options.threshold);
        for url in &urls {
            match self.evaluate(&seed, url).await {
                CandidateOutcome::Accepted(m) => {
                    info!(url = %m.url, score = m.similarity_score, "Accepted");
                    stats.accepted += 1;
                    match_set.matches.push(m);
                }
                CandidateOutcome::Rejected { score } => {
                    debug!(%url, score, "Below threshold");
                    stats.rejected += 1;
                }
                CandidateOutcome::Empty => {
                    debug!(%url, "No extractable text");
                    stats.empty += 1;
                }
                CandidateOutcome::TooShort { chars } => {
                    debug!(%url, chars, "Too little text to compare");
                    stats.too_short += 1;
                }
                CandidateOutcome::Skipped(e) => {
                    warn!(%url, error = %e, "Candidate fetch failed; skipping");
                    stats.skipped += 1;
                }
            }
        }

        if self.options.sort_by_score {
            match_set
                .matches
                .sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        }
        Ok((match_set, stats))
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_seed(&self, seed_url: &str) -> Result<SeedArticle, SpiderError> {
        let seed_fetch = |source| SpiderError::SeedFetch {
            url: seed_url.to_string(),
            source,
        };
        Url::parse(seed_url).map_err(|_| seed_fetch(FetchError::InvalidUrl(seed_url.to_string())))?;

        let html = self.fetcher.fetch(seed_url).await.map_err(seed_fetch)?;
        let extracted = self.extractor.extract(&html);
        if extracted.is_empty() {
            return Err(SpiderError::SeedEmpty {
                url: seed_url.to_string(),
            });
        }

        info!(chars = extracted.raw_text.chars().count(), "Seed article extracted");
        Ok(SeedArticle {
            url: seed_url.to_string(),
            raw_text: extracted.raw_text,
            normalized_text: extracted.normalized_text,
            fetched_at: Utc::now(),
        })
    }

    fn queries(&self, seed: &SeedArticle) -> Vec<String> {
        let mut sentences = top_sentences(
            &seed.raw_text,
            self.options.query_count,
            self.options.query_max_words,
        );
        if sentences.is_empty() {
            // short seeds: search the opening words instead
            sentences.extend(opening_words(&seed.raw_text, self.options.query_max_words));
        }

        if self.backend.prefers_unquoted() {
            sentences
        } else {
            sentences.iter().map(|s| quote(s)).collect()
        }
    }

    /// `SEARCH`: unique candidate URLs in discovery order, seed excluded.
    async fn discover(
        &self,
        seed: &SeedArticle,
        stats: &mut RunStats,
    ) -> Result<Vec<String>, SpiderError> {
        let seed_key = normalize_url(&seed.url);
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for query in self.queries(seed) {
            stats.queries += 1;
            debug!(query = %truncate_for_log(&query, 120), "Searching");
            let results = self
                .backend
                .search(&query, self.options.max_results)
                .await?;

            for url in results {
                stats.results += 1;
                let key = normalize_url(&url);
                if key == seed_key {
                    stats.self_matches += 1;
                    continue;
                }
                if !seen.insert(key) {
                    stats.duplicates += 1;
                    continue;
                }
                urls.push(url);
            }
        }
        Ok(urls)
    }

    /// `EVALUATE`: fetch, extract, and score one candidate.
    #[instrument(level = "debug", skip(self, seed))]
    pub async fn evaluate(&self, seed: &SeedArticle, url: &str) -> CandidateOutcome {
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => return CandidateOutcome::Skipped(e),
        };
        let extracted = self.extractor.extract(&html);
        let candidate = Candidate {
            url: url.to_string(),
            raw_html: html,
            raw_text: extracted.raw_text,
            normalized_text: extracted.normalized_text,
        };

        if candidate.normalized_text.is_empty() {
            return CandidateOutcome::Empty;
        }
        let chars = candidate.raw_text.chars().count();
        if chars < self.options.min_candidate_chars {
            return CandidateOutcome::TooShort { chars };
        }

        let score = similarity::score(&seed.normalized_text, &candidate.normalized_text);
        if score >= self.options.threshold {
            CandidateOutcome::Accepted(Match::new(
                &candidate.url,
                score,
                take_chars(&candidate.raw_text, SNIPPET_CHARS),
            ))
        } else {
            CandidateOutcome::Rejected { score }
        }
    }
}
