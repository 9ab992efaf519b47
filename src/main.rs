//! `echo_trace`: run the spider for one seed article.
//!
//! ```sh
//! echo_trace https://news.example.com/story --engine gdelt --threshold 0.8
//! ```
//!
//! Exits non-zero when the seed cannot be fetched, the search backend is
//! unavailable or misconfigured, or the match set cannot be written. The log
//! line for the failure names the stage.

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info};

use echo_trace::cli::SpiderCli;
use echo_trace::config::SpiderConfig;
use echo_trace::error::{ConfigError, SpiderError};
use echo_trace::extract::ContentExtractor;
use echo_trace::fetch::HttpFetcher;
use echo_trace::rate_limit::{RateLimiter, SharedLimiter};
use echo_trace::search::{DuckDuckGoSearch, Engine, GdeltSearch, GoogleSearch, SearchBackend};
use echo_trace::spider::{Spider, SpiderReport};
use echo_trace::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let start_time = Instant::now();
    let args = SpiderCli::parse();
    debug!(?args.url, ?args.engine, "Parsed CLI arguments");

    match execute(&args).await {
        Ok(report) => {
            info!(
                seed = %args.url,
                engine = %report.match_set.engine,
                matches = report.match_set.matches.len(),
                candidates = report.stats.candidates,
                skipped = report.stats.skipped,
                path = %report.path.display(),
                elapsed = ?start_time.elapsed(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(seed = %args.url, error = %e, "Spider run failed");
            Err(e.into())
        }
    }
}

async fn execute(args: &SpiderCli) -> Result<SpiderReport, SpiderError> {
    let config = SpiderConfig::resolve(args)?;
    info!(engine = %config.engine, threshold = config.threshold, "echo_trace starting up");

    let limiter = RateLimiter::new(config.delay())
        .with_jitter(config.jitter())
        .shared();
    let client = config
        .http
        .client()
        .map_err(|e| ConfigError::invalid("http", e.to_string()))?;
    let fetcher = HttpFetcher::new(&config.http, SharedLimiter::clone(&limiter))
        .map_err(|e| ConfigError::invalid("http", e.to_string()))?;

    match config.engine {
        Engine::Google => {
            let backend = GoogleSearch::new(&config.google, client, limiter)?;
            crawl(backend, fetcher, &config, &args.url).await
        }
        Engine::Gdelt => {
            let backend = GdeltSearch::new(config.gdelt.clone(), client, limiter)?;
            crawl(backend, fetcher, &config, &args.url).await
        }
        Engine::DuckDuckGo => {
            let backend = DuckDuckGoSearch::new(&config.duckduckgo.base_url, client, limiter);
            crawl(backend, fetcher, &config, &args.url).await
        }
    }
}

async fn crawl<B: SearchBackend>(
    backend: B,
    fetcher: HttpFetcher,
    config: &SpiderConfig,
    seed_url: &str,
) -> Result<SpiderReport, SpiderError> {
    let spider = Spider::new(
        backend,
        fetcher,
        ContentExtractor::new(config.case_policy),
        config.spider_options(),
    )?;
    spider.run(seed_url).await
}
