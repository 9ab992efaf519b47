//! Spider configuration: built-in defaults, optional YAML file, CLI overrides.
//!
//! Precedence is CLI flag (or its environment variable) > config file >
//! default. The resolved [`SpiderConfig`] is validated before any backend is
//! built, so bad values never reach the network.
//!
//! # Example file
//!
//! ```yaml
//! engine: google
//! threshold: 0.8
//! delay_secs: 2
//! output_dir: data/crawled
//! http:
//!   timeout_secs: 20
//! google:
//!   api_key: "..."
//!   cse_id: "..."
//! gdelt:
//!   timespan: 7d
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::cli::SpiderCli;
use crate::error::ConfigError;
use crate::extract::CasePolicy;
use crate::fetch::HttpSettings;
use crate::search::Engine;
use crate::search::duckduckgo;
use crate::search::gdelt::GdeltSettings;
use crate::search::google::GoogleSettings;
use crate::spider::SpiderOptions;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DuckDuckGoSettings {
    pub base_url: String,
}

impl Default for DuckDuckGoSettings {
    fn default() -> Self {
        Self {
            base_url: duckduckgo::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Everything a spider run needs, after merging all configuration sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpiderConfig {
    pub engine: Engine,
    /// Minimum similarity for a candidate to be accepted, in `(0, 1]`.
    pub threshold: f64,
    /// Minimum seconds between two requests to the same service.
    pub delay_secs: f64,
    /// Random extra delay added on top of `delay_secs`.
    pub jitter_ms: u64,
    pub max_results: usize,
    pub query_count: usize,
    pub query_max_words: usize,
    pub min_candidate_chars: usize,
    pub sort_by_score: bool,
    pub output_dir: PathBuf,
    pub case_policy: CasePolicy,
    pub http: HttpSettings,
    pub google: GoogleSettings,
    pub gdelt: GdeltSettings,
    pub duckduckgo: DuckDuckGoSettings,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        let options = SpiderOptions::default();
        Self {
            engine: Engine::default(),
            threshold: options.threshold,
            delay_secs: 2.0,
            jitter_ms: 0,
            max_results: options.max_results,
            query_count: options.query_count,
            query_max_words: options.query_max_words,
            min_candidate_chars: options.min_candidate_chars,
            sort_by_score: options.sort_by_score,
            output_dir: options.output_dir,
            case_policy: CasePolicy::default(),
            http: HttpSettings::default(),
            google: GoogleSettings::default(),
            gdelt: GdeltSettings::default(),
            duckduckgo: DuckDuckGoSettings::default(),
        }
    }
}

impl SpiderConfig {
    /// Read a YAML config file; missing keys take their defaults.
    #[instrument(level = "info", fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: SpiderConfig =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        info!("Loaded configuration file");
        Ok(config)
    }

    /// Merge the config file named by `--config` (if any) with CLI overrides.
    pub fn resolve(cli: &SpiderCli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        debug!(?config.engine, config.threshold, config.delay_secs, "Resolved configuration");
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &SpiderCli) {
        if let Some(engine) = cli.engine {
            self.engine = engine;
        }
        if let Some(threshold) = cli.threshold {
            self.threshold = threshold;
        }
        if let Some(delay) = cli.delay {
            self.delay_secs = delay;
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(max_results) = cli.max_results {
            self.max_results = max_results;
        }
        if let Some(min_chars) = cli.min_chars {
            self.min_candidate_chars = min_chars;
        }
        if cli.sort_by_score {
            self.sort_by_score = true;
        }
        if cli.google_api_key.is_some() {
            self.google.api_key = cli.google_api_key.clone();
        }
        if cli.google_cse_id.is_some() {
            self.google.cse_id = cli.google_cse_id.clone();
        }
        if cli.gdelt_start.is_some() {
            self.gdelt.start = cli.gdelt_start.clone();
        }
        if cli.gdelt_end.is_some() {
            self.gdelt.end = cli.gdelt_end.clone();
        }
        if let Some(span) = &cli.gdelt_timespan {
            self.gdelt.timespan = span.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "threshold",
                format!("{} is outside (0, 1]", self.threshold),
            ));
        }
        if Duration::try_from_secs_f64(self.delay_secs).is_err() {
            return Err(ConfigError::invalid(
                "delay",
                format!(
                    "{} must be a non-negative, representable number of seconds",
                    self.delay_secs
                ),
            ));
        }
        if self.max_results == 0 {
            return Err(ConfigError::invalid("max_results", "must be greater than zero"));
        }
        if self.query_count == 0 || self.query_max_words == 0 {
            return Err(ConfigError::invalid(
                "query_count/query_max_words",
                "must be greater than zero",
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// The configured delay. Unrepresentable values, which [`Self::validate`]
    /// rejects, saturate instead of panicking.
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_secs).unwrap_or(Duration::MAX)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn spider_options(&self) -> SpiderOptions {
        SpiderOptions {
            threshold: self.threshold,
            max_results: self.max_results,
            query_count: self.query_count,
            query_max_words: self.query_max_words,
            min_candidate_chars: self.min_candidate_chars,
            sort_by_score: self.sort_by_score,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> SpiderCli {
        let mut argv = vec!["echo_trace"];
        argv.extend_from_slice(args);
        SpiderCli::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = SpiderConfig::default();
        assert_eq!(config.engine, Engine::Gdelt);
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.delay_secs, 2.0);
        assert_eq!(config.output_dir, PathBuf::from("data/crawled"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let config = SpiderConfig::resolve(&cli(&[
            "https://example.com/a",
            "--engine",
            "duckduckgo",
            "--threshold",
            "0.65",
            "--delay",
            "0.5",
            "--gdelt-timespan",
            "7d",
        ]))
        .unwrap();
        assert_eq!(config.engine, Engine::DuckDuckGo);
        assert_eq!(config.threshold, 0.65);
        assert_eq!(config.delay(), Duration::from_millis(500));
        assert_eq!(config.gdelt.timespan, "7d");
    }

    #[test]
    fn test_file_then_cli_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "engine: google\nthreshold: 0.9\nmax_results: 7\ngoogle:\n  api_key: from-file\n  cse_id: cx\nhttp:\n  timeout_secs: 5"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = SpiderConfig::resolve(&cli(&[
            "https://example.com/a",
            "--config",
            path,
            "--threshold",
            "0.75",
        ]))
        .unwrap();

        assert_eq!(config.engine, Engine::Google);
        assert_eq!(config.threshold, 0.75);
        assert_eq!(config.max_results, 7);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.gdelt.timespan, "30d");
        assert_eq!(config.spider_options().max_results, 7);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        for bad in ["--threshold=0", "--threshold=1.5", "--threshold=-0.2"] {
            let err = SpiderConfig::resolve(&cli(&["https://example.com/a", bad])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "threshold", .. }));
        }
        assert!(
            SpiderConfig::resolve(&cli(&["https://example.com/a", "--threshold", "1.0"])).is_ok()
        );
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = SpiderConfig::resolve(&cli(&["https://example.com/a", "--delay=-1"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "delay", .. }));
    }

    #[test]
    fn test_unrepresentable_delay_rejected() {
        let err = SpiderConfig::resolve(&cli(&["https://example.com/a", "--delay=1e20"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "delay", .. }));

        let err = SpiderConfig::resolve(&cli(&["https://example.com/a", "--delay=inf"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "delay", .. }));
    }

    #[test]
    fn test_large_representable_delay_accepted() {
        let config = SpiderConfig::resolve(&cli(&["https://example.com/a", "--delay=86400"])).unwrap();
        assert_eq!(config.delay(), Duration::from_secs(86400));
    }

    #[test]
    fn test_missing_file() {
        let err = SpiderConfig::resolve(&cli(&[
            "https://example.com/a",
            "--config",
            "/definitely/not/here.yaml",
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold: [not, a, number]").unwrap();
        let err = SpiderConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
