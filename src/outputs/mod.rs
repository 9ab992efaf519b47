//! Output writers.
//!
//! - [`json`]: match sets from spider runs and the anomaly report

pub mod json;
