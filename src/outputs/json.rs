//! JSON persistence for match sets and anomaly reports.
//!
//! # Output Structure
//!
//! ```text
//! data/crawled/
//! ├── matches_google.json
//! ├── matches_gdelt.json
//! └── matches_duckduckgo.json
//!
//! data/analysis/
//! └── reuse_anomalies.json
//! ```
//!
//! Files are written to a `.tmp` sibling and renamed into place, so a reader
//! scanning the directory never sees a half-written match set.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::anomaly::AnomalyReport;
use crate::error::{AnomalyError, SpiderError};
use crate::models::MatchSet;
use crate::utils::ensure_writable_dir;

/// Write a [`MatchSet`] as pretty JSON to `{output_dir}/matches_{engine}.json`.
///
/// An empty set is still written. An existing file for the same engine is
/// replaced.
///
/// # Arguments
///
/// * `match_set` - The run's accepted matches
/// * `output_dir` - Directory to write into; created if missing
///
/// # Returns
///
/// The path of the written file.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_match_set(
    match_set: &MatchSet,
    output_dir: &Path,
) -> Result<PathBuf, SpiderError> {
    let json = serde_json::to_string_pretty(match_set)?;
    let path = output_dir.join(match_set.file_name());

    ensure_writable_dir(output_dir).await.map_err(|source| {
        error!(error = %source, "Output directory is not writable");
        SpiderError::Persist {
            path: output_dir.display().to_string(),
            source,
        }
    })?;

    write_atomically(&path, json.as_bytes())
        .await
        .map_err(|source| SpiderError::Persist {
            path: path.display().to_string(),
            source,
        })?;

    info!(path = %path.display(), matches = match_set.matches.len(), "Wrote match set");
    Ok(path)
}

/// Write the anomaly report as pretty JSON to `path`, creating parent dirs.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &AnomalyReport, path: &Path) -> Result<(), AnomalyError> {
    let io_err = |source| AnomalyError::Io {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_string_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_writable_dir(parent).await.map_err(io_err)?;
    }
    write_atomically(path, json.as_bytes()).await.map_err(io_err)?;

    info!(flagged = report.flagged, domains = report.domains, "Wrote anomaly report");
    Ok(())
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Match;

    #[tokio::test]
    async fn test_write_match_set_creates_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/crawled");

        let mut set = MatchSet::new("https://seed.example.com/a", "google", 0.8);
        set.matches.push(Match::new("https://news.example.org/x", 0.9, "snippet".into()));

        let path = write_match_set(&set, &out).await.unwrap();
        assert_eq!(path, out.join("matches_google.json"));

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let back: MatchSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, set);
        assert!(!out.join("matches_google.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_empty_set_is_written_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = MatchSet::new("https://seed.example.com/a", "gdelt", 0.8);
        set.matches.push(Match::new("https://a.example.org/x", 0.95, String::new()));
        write_match_set(&set, dir.path()).await.unwrap();

        let empty = MatchSet::new("https://seed.example.com/a", "gdelt", 0.8);
        let path = write_match_set(&empty, dir.path()).await.unwrap();

        let back: MatchSet =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(back.matches.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let set = MatchSet::new("https://seed.example.com/a", "google", 0.8);
        let err = write_match_set(&set, &blocker.join("sub")).await.unwrap_err();
        assert!(matches!(err, SpiderError::Persist { .. }));
    }
}
