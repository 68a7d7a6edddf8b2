//! Core data types for the METAR station monitor.
//!
//! This module defines the shared domain model imported by all other modules:
//! station and owner configuration, observations, the tagged fetch outcome,
//! run records, alert events, and the error taxonomy. It contains no I/O.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Station identifiers
// ---------------------------------------------------------------------------

/// Normalizes a station identifier the way the registry stores them:
/// surrounding whitespace removed, upper-case.
pub fn normalize_station_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// ICAO-style station identifiers are 3 to 6 ASCII alphanumerics
/// (e.g. "KJWY", "PIA"). Anything else will never match a feed entry.
pub fn is_valid_station_id(station_id: &str) -> bool {
    (3..=6).contains(&station_id.len()) && station_id.chars().all(|c| c.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Registry types
// ---------------------------------------------------------------------------

/// Which bad statuses a station wants to be notified about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyOn {
    /// `error` and `stale` (stale data is a failed feed from the owner's view).
    Error,
    Empty,
    #[default]
    Both,
}

impl NotifyOn {
    /// Lenient parse: unknown or blank values fall back to `Both`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => NotifyOn::Error,
            "empty" => NotifyOn::Empty,
            _ => NotifyOn::Both,
        }
    }

    pub fn covers(self, status: RunStatus) -> bool {
        match (self, status) {
            (_, RunStatus::Ok) => false,
            (NotifyOn::Both, _) => true,
            (NotifyOn::Error, RunStatus::Error | RunStatus::Stale) => true,
            (NotifyOn::Empty, RunStatus::Empty) => true,
            _ => false,
        }
    }
}

impl<'de> Deserialize<'de> for NotifyOn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(NotifyOn::parse_lenient(&raw))
    }
}

/// Reference to an owner's notification endpoint (a webhook URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(pub String);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked station as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub station_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
    #[serde(default)]
    pub notify_on: NotifyOn,
    /// Per-station override of the global cooldown window.
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
}

impl StationConfig {
    pub fn new(station_id: &str, owner_id: Option<&str>) -> Self {
        StationConfig {
            station_id: normalize_station_id(station_id),
            owner_id: owner_id.map(String::from),
            enabled: true,
            alerts_enabled: true,
            notify_on: NotifyOn::Both,
            cooldown_minutes: None,
        }
    }

    /// Owner id with blank strings treated as "no owner".
    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }
}

/// An owner and the channel its alerts are delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerConfig {
    pub owner_id: String,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Observations and fetch outcomes
// ---------------------------------------------------------------------------

/// A single METAR observation. `(station_id, observation_time)` is the
/// natural key; storing the same key twice overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station_id: String,
    pub observation_time: DateTime<Utc>,
    /// Raw METAR text, e.g. "KJWY 201953Z AUTO 18009KT 10SM CLR 08/M03 A3012".
    pub raw_text: String,
}

/// Outcome of asking the observation source about one station.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Non-empty, ordered oldest to newest.
    Observations(Vec<Observation>),
    /// The feed answered but had nothing for this station.
    Empty,
    /// Network failure, timeout, bad response.
    FetchError(String),
}

impl FetchResult {
    /// Builds a result from a possibly-empty list, keeping the non-empty
    /// invariant of `Observations` and ordering entries by time.
    pub fn from_observations(mut observations: Vec<Observation>) -> Self {
        if observations.is_empty() {
            return FetchResult::Empty;
        }
        observations.sort_by_key(|o| o.observation_time);
        observations.dedup_by_key(|o| o.observation_time);
        FetchResult::Observations(observations)
    }

    pub fn newest_observation_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FetchResult::Observations(obs) => obs.iter().map(|o| o.observation_time).max(),
            _ => None,
        }
    }

    pub fn observation_count(&self) -> usize {
        match self {
            FetchResult::Observations(obs) => obs.len(),
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Run records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Empty,
    Error,
    Stale,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Empty => "empty",
            RunStatus::Error => "error",
            RunStatus::Stale => "stale",
        }
    }

    pub fn is_bad(self) -> bool {
        self != RunStatus::Ok
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(RunStatus::Ok),
            "empty" => Ok(RunStatus::Empty),
            "error" => Ok(RunStatus::Error),
            "stale" => Ok(RunStatus::Stale),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// Outcome of one station in one cycle. Exactly one per
/// `(station_id, checked_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub station_id: String,
    /// Cycle start time, whole seconds.
    pub checked_at: DateTime<Utc>,
    pub status: RunStatus,
    pub newest_observation_time: Option<DateTime<Utc>>,
    pub observation_count: u32,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Alert events
// ---------------------------------------------------------------------------

/// A bad outcome on its way to the cooldown router.
///
/// Everything the router needs is embedded here, including the station's
/// alert policy as it was at emission time; the router never re-reads the
/// station from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub station_id: String,
    pub owner_id: Option<String>,
    pub cycle_at: DateTime<Utc>,
    pub status: RunStatus,
    pub reason: String,
    pub alerts_enabled: bool,
    pub notify_on: NotifyOn,
    pub cooldown_override_minutes: Option<u32>,
    /// Feed URL the station was checked against, when the source exposes one.
    pub source_url: Option<String>,
}

impl AlertEvent {
    /// Idempotency key: `(station_id, cycle)`.
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.station_id, self.cycle_at)
    }

    pub fn cooldown_override(&self) -> Option<Duration> {
        self.cooldown_override_minutes.map(|m| Duration::minutes(i64::from(m)))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures the pipeline distinguishes. None of them is fatal for a cycle on
/// its own; see `cycle::CycleError` for the fatal cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Network failure or timeout talking to the observation feed.
    #[error("fetch failed: {0}")]
    TransientFetch(String),
    /// Missing or invalid station/owner data.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Run store, observation store, cooldown store, or registry unavailable.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// Notification channel refused or failed the message.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}
