//! Observation staleness detection.
//!
//! METAR stations report at least hourly. A feed that still answers but
//! whose newest observation is hours old usually means the station's
//! sensors or uplink are down, which owners need to hear about just like
//! an outright fetch failure.
//!
//! # Clock injection
//! All functions take the reference time as a parameter rather than calling
//! `Utc::now()` internally. The evaluator passes the cycle start time, which
//! keeps every station in one cycle judged against the same instant and
//! makes tests deterministic.

use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Age of the newest observation relative to `now`. Negative when the
/// observation is timestamped after `now` (station clock ahead).
pub fn observation_age(newest: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now - newest
}

/// Returns `true` if `newest` is older than `threshold` relative to `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > threshold  →  stale
///   age == threshold →  not stale
pub fn is_stale_at(newest: DateTime<Utc>, threshold: Duration, now: DateTime<Utc>) -> bool {
    observation_age(newest, now) > threshold
}

/// Human-readable age for run-record details, e.g. "3h05m".
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
