//! Structured logging for the METAR monitor
//!
//! Installs a `tracing` subscriber (console or file) and provides the
//! station-aware helpers the pipeline logs through: fetch-failure
//! classification and the per-cycle summary line.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::cycle::CycleSummary;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Which part of the pipeline a log line comes from; emitted as the
/// `component` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Source,
    Evaluator,
    Store,
    Router,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Source => write!(f, "SRC"),
            Component::Evaluator => write!(f, "EVAL"),
            Component::Store => write!(f, "DB"),
            Component::Router => write!(f, "ROUTER"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Station offline or not reporting; nothing wrong on our side
    Expected,
    /// Feed outage, network trouble, or an API change
    Unexpected,
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a feed failure from its diagnostic text.
pub fn classify_fetch_failure(detail: &str) -> FailureType {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("http error: 404") || lower.contains("no data") {
        FailureType::Expected
    } else if lower.contains("http error")
        || lower.contains("timeout")
        || lower.contains("connection failed")
        || lower.contains("parse error")
    {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. With `log_file` the
/// output goes to that file (appending, no ANSI colors) instead of stderr.
pub fn init_logger(default_level: &str, log_file: Option<&Path>, timestamps: bool) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| format!("invalid log level '{}': {}", default_level, e))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match (log_file, timestamps) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("failed to open log file {}: {}", path.display(), e))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        (None, true) => builder.with_writer(std::io::stderr).try_init(),
        (None, false) => builder.without_time().with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| format!("logger already initialized: {}", e))
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a feed failure at a level matching its classification.
pub fn log_fetch_failure(station_id: &str, detail: &str) {
    let failure_type = classify_fetch_failure(detail);
    let component = Component::Source;
    match failure_type {
        FailureType::Expected => {
            tracing::debug!(%component, station_id, %failure_type, "fetch failed: {}", detail)
        }
        FailureType::Unexpected => {
            tracing::error!(%component, station_id, %failure_type, "fetch failed: {}", detail)
        }
        FailureType::Unknown => {
            tracing::warn!(%component, station_id, %failure_type, "fetch failed: {}", detail)
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log one line per cycle: info when everything was evaluated, warn on
/// partial failure, error when nothing could be evaluated.
pub fn log_cycle_summary(summary: &CycleSummary) {
    let counts = summary.counts();
    let component = Component::System;
    let message = format!(
        "cycle {} complete: {}/{} evaluated ({} ok, {} bad), {} skipped, {} failed, {} not evaluated; alerts {} dispatched, {} suppressed, {} failed",
        summary.cycle_at.to_rfc3339(),
        counts.evaluated,
        counts.total,
        counts.ok,
        counts.evaluated - counts.ok,
        counts.skipped,
        counts.failed,
        counts.not_evaluated,
        counts.dispatched,
        counts.suppressed,
        counts.dispatch_failed,
    );

    if counts.failed == 0 && counts.not_evaluated == 0 {
        tracing::info!(%component, "{}", message);
    } else if counts.evaluated == 0 && counts.total > 0 {
        tracing::error!(%component, "{}", message);
    } else {
        tracing::warn!(%component, "{}", message);
    }
}
