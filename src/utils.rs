//! Utility functions for URL handling, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - URL normalization for self-match exclusion and de-duplication
//! - Domain / subdomain splitting for reuse aggregation
//! - Character-safe truncation for snippets and logging
//! - JSON error detection for half-written match set files
//! - File system validation for output directories
//! - Tracing subscriber setup shared by both binaries

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk`, `example.com.au`, ...).
const SECOND_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org", "ne", "or"];

/// Normalize a URL for identity comparisons.
///
/// Scheme, a leading `www.`, the fragment, and a trailing slash on the path
/// are ignored; host and scheme are lower-cased by the URL parser. Strings
/// that do not parse are compared trimmed and lower-cased.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     normalize_url("https://www.Example.com/a/#top"),
///     normalize_url("http://example.com/a"),
/// );
/// ```
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            let host = host.strip_prefix("www.").unwrap_or(host);
            let path = url.path().trim_end_matches('/');
            match url.query() {
                Some(q) if !q.is_empty() => format!("{host}{path}?{q}"),
                _ => format!("{host}{path}"),
            }
        }
        Err(_) => raw.trim().trim_end_matches('/').to_lowercase(),
    }
}

/// Split a URL's host into `(registrable domain, subdomain)`.
///
/// The subdomain is the full host without a leading `www.`; the registrable
/// domain is its last two labels, or three when the second-to-last label is
/// a common second-level registry label such as `co` in `example.co.uk`.
/// IP hosts are returned unchanged for both parts.
///
/// # Returns
///
/// `None` when the URL does not parse or has no host.
pub fn domain_parts(raw: &str) -> Option<(String, String)> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return Some((host.clone(), host));
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let keep = if labels.len() >= 3
        && labels[labels.len() - 1].len() == 2
        && SECOND_LEVEL_LABELS.contains(&labels[labels.len() - 2])
    {
        3
    } else {
        2
    };
    let domain = labels[labels.len().saturating_sub(keep)..].join(".");
    Some((domain, host))
}

/// Host of a URL, used as the rate-limiter key for page fetches.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Take the first `max` characters of `s` without splitting a code point.
pub fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A match set file that is still being written by a spider run ends
/// abruptly and fails with an EOF error; callers use this to tell that case
/// apart from a genuinely malformed file.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    fs::write(&scratch_path, b"").await?;
    let _ = fs::remove_file(&scratch_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}
