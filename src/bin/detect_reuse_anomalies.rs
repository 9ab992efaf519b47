//! `detect_reuse_anomalies`: flag domains with unusual subdomain reuse.
//!
//! Reads every `matches_*.json` under the given inputs, aggregates matches per
//! registrable domain, and writes the flags report. Makes no network requests.

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info};

use echo_trace::anomaly::{AnomalyReport, load_match_sets};
use echo_trace::cli::AnomalyCli;
use echo_trace::error::AnomalyError;
use echo_trace::outputs::json::write_report;
use echo_trace::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let start_time = Instant::now();
    let args = AnomalyCli::parse();
    debug!(?args, "Parsed CLI arguments");

    match execute(&args).await {
        Ok(report) => {
            info!(
                match_sets = report.match_sets,
                domains = report.domains,
                flagged = report.flagged,
                output = %args.output.display(),
                elapsed = ?start_time.elapsed(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Anomaly detection failed");
            Err(e.into())
        }
    }
}

async fn execute(args: &AnomalyCli) -> Result<AnomalyReport, AnomalyError> {
    let config = args.anomaly_config();
    config.validate()?;

    let match_sets = load_match_sets(&args.input).await?;
    let report = AnomalyReport::build(&match_sets, &config);
    write_report(&report, &args.output).await?;
    Ok(report)
}
