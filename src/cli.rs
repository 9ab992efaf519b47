//! Command-line interface definitions for the spider and the anomaly detector.
//!
//! Both binaries parse their arguments with `clap`. Spider options left unset
//! fall through to the config file and then to built-in defaults; see
//! [`crate::config`]. Google credentials can also come from the environment.

use clap::Parser;
use std::path::PathBuf;

use crate::anomaly::{AnomalyConfig, ReuseMetric, Statistic};
use crate::search::Engine;

/// Trace where a seed article's content reappears on the web.
///
/// # Examples
///
/// ```sh
/// # GDELT (default engine), default threshold 0.8
/// echo_trace https://news.example.com/story
///
/// # Google Custom Search, stricter threshold, slower pacing
/// GOOGLE_API_KEY=... GOOGLE_CSE_ID=... \
///   echo_trace https://news.example.com/story --engine google --threshold 0.9 --delay 5
///
/// # GDELT restricted to a date window
/// echo_trace https://news.example.com/story --gdelt-start 2025-05-01 --gdelt-end 2025-05-06
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct SpiderCli {
    /// URL of the seed article
    pub url: String,

    /// Search engine to discover candidates with
    #[arg(short, long, value_enum)]
    pub engine: Option<Engine>,

    /// Minimum similarity (0, 1] for a candidate to count as a match
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Minimum seconds between requests to the same service
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Directory the match set is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Results requested per search query
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Candidates with less extracted text than this are not scored
    #[arg(long)]
    pub min_chars: Option<usize>,

    /// Order matches by descending score instead of discovery order
    #[arg(long)]
    pub sort_by_score: bool,

    /// Google Custom Search API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Google programmable search engine id
    #[arg(long, env = "GOOGLE_CSE_ID")]
    pub google_cse_id: Option<String>,

    /// GDELT window start (YYYY-MM-DD or YYYYMMDDHHMMSS)
    #[arg(long)]
    pub gdelt_start: Option<String>,

    /// GDELT window end (YYYY-MM-DD or YYYYMMDDHHMMSS)
    #[arg(long)]
    pub gdelt_end: Option<String>,

    /// GDELT relative window, e.g. 7d or 3months; ignored when start/end are set
    #[arg(long)]
    pub gdelt_timespan: Option<String>,
}

/// Flag domains whose matches are spread across unusually many subdomains.
///
/// # Examples
///
/// ```sh
/// detect_reuse_anomalies
/// detect_reuse_anomalies -i data/crawled -i old/matches_google.json --statistic mean-stddev --factor 1.5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct AnomalyCli {
    /// Match set files or directories containing matches_*.json
    #[arg(short, long, default_value = "data/crawled")]
    pub input: Vec<PathBuf>,

    /// Where the anomaly report is written
    #[arg(short, long, default_value = "data/analysis/reuse_anomalies.json")]
    pub output: PathBuf,

    /// Baseline statistic
    #[arg(long, value_enum, default_value_t = Statistic::Median)]
    pub statistic: Statistic,

    /// Count compared against the baseline
    #[arg(long, value_enum, default_value_t = ReuseMetric::Either)]
    pub metric: ReuseMetric,

    /// Multiplier (median) or number of standard deviations (mean-stddev)
    #[arg(long, default_value_t = 3.0)]
    pub factor: f64,

    /// Minimum number of domains needed before anything is flagged
    #[arg(long, default_value_t = 3)]
    pub min_domains: usize,
}

impl AnomalyCli {
    pub fn anomaly_config(&self) -> AnomalyConfig {
        AnomalyConfig {
            statistic: self.statistic,
            metric: self.metric,
            factor: self.factor,
            min_domains: self.min_domains,
        }
    }
}
