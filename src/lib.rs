//! # Echo Trace
//!
//! Trace how a seed news article's content propagates across the web, then
//! flag domains that republish it across suspiciously many subdomains.
//!
//! ## Architecture
//!
//! A spider run is a pipeline:
//! 1. **Fetch seed**: download the seed URL and extract its article text
//! 2. **Search**: turn the seed's leading sentences into queries against one
//!    [`search::SearchBackend`] (Google, GDELT, or DuckDuckGo)
//! 3. **Evaluate**: fetch each unique candidate, extract its text, and score it
//!    against the seed with [`similarity::score`]
//! 4. **Persist**: write the accepted matches to `matches_<engine>.json`
//!
//! The [`anomaly`] detector reads any number of those files offline and
//! reports domains whose reuse is far above the population baseline.
//!
//! All outbound requests go through a shared [`rate_limit::RateLimiter`].

pub mod anomaly;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod rate_limit;
pub mod search;
pub mod similarity;
pub mod spider;
pub mod utils;
