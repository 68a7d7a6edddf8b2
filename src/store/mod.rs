//! Durable state: run records and observations.
//!
//! `RunStore` exclusively owns run-record durability. Retention is a
//! best-effort sweep (`prune`) that may lag behind the cutoff; readers
//! that need a strict cutoff filter by `checked_at` themselves. The same
//! sweep also expires cooldown pairs nobody has alerted for in a while.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Duration, Utc};

use crate::alert::cooldown::CooldownStore;
use crate::config::MonitorConfig;
use crate::logging::Component;
use crate::model::{MonitorError, Observation, RunRecord};

/// Half-open time range `[start, end)`; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn since(start: DateTime<Utc>) -> Self {
        TimeRange { start: Some(start), end: None }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| t >= s) && self.end.is_none_or(|e| t < e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub station_id: Option<String>,
    pub range: TimeRange,
    pub limit: usize,
}

impl RunQuery {
    pub fn station(station_id: &str, limit: usize) -> Self {
        RunQuery {
            station_id: Some(station_id.to_string()),
            range: TimeRange::default(),
            limit,
        }
    }
}

/// How far back the evaluator looks for a previously known observation time
/// when the feed fails.
const CARRY_FORWARD_LOOKBACK: usize = 48;

pub trait RunStore: Send + Sync {
    /// Cheap reachability probe, run before a cycle starts.
    fn ping(&self) -> Result<(), MonitorError>;

    /// Insert or replace the record for `(station_id, checked_at)`.
    fn upsert(&self, record: &RunRecord) -> Result<(), MonitorError>;

    /// Records matching `query`, newest first, at most `query.limit`.
    fn query(&self, query: &RunQuery) -> Result<Vec<RunRecord>, MonitorError>;

    /// Remove records checked before `older_than`. Returns how many went.
    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError>;

    /// Most recent known newest-observation time for a station.
    fn latest_newest_observation(&self, station_id: &str) -> Result<Option<DateTime<Utc>>, MonitorError> {
        let recent = self.query(&RunQuery::station(station_id, CARRY_FORWARD_LOOKBACK))?;
        Ok(recent.into_iter().find_map(|r| r.newest_observation_time))
    }
}

/// Raw observation archive. Writes are idempotent on
/// `(station_id, observation_time)`.
pub trait ObservationStore: Send + Sync {
    fn upsert_observations(
        &self,
        observations: &[Observation],
        collected_at: DateTime<Utc>,
    ) -> Result<usize, MonitorError>;

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError>;
}

pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

/// Retention windows in days, one per kind of stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub run_days: u32,
    pub metar_days: u32,
    pub cooldown_days: u32,
}

impl Retention {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Retention {
            run_days: config.run_retention_days,
            metar_days: config.metar_retention_days,
            cooldown_days: config.cooldown_retention_days,
        }
    }
}

/// Result of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub runs_removed: usize,
    pub observations_removed: usize,
    pub cooldowns_removed: usize,
}

/// Purge expired run records, observations and cooldown pairs. Failures are
/// logged and the sweep simply tries again after the next cycle.
pub fn sweep_expired(
    runs: &dyn RunStore,
    observations: Option<&dyn ObservationStore>,
    cooldowns: Option<&dyn CooldownStore>,
    now: DateTime<Utc>,
    retention: &Retention,
) -> SweepReport {
    let mut report = SweepReport::default();

    match runs.prune(retention_cutoff(now, retention.run_days)) {
        Ok(n) => report.runs_removed = n,
        Err(e) => tracing::warn!(component = %Component::Store, "run record retention sweep failed: {}", e),
    }
    if let Some(store) = observations {
        match store.prune(retention_cutoff(now, retention.metar_days)) {
            Ok(n) => report.observations_removed = n,
            Err(e) => tracing::warn!(component = %Component::Store, "observation retention sweep failed: {}", e),
        }
    }
    if let Some(store) = cooldowns {
        match store.prune(retention_cutoff(now, retention.cooldown_days)) {
            Ok(n) => report.cooldowns_removed = n,
            Err(e) => tracing::warn!(component = %Component::Store, "cooldown retention sweep failed: {}", e),
        }
    }

    if report.runs_removed + report.observations_removed + report.cooldowns_removed > 0 {
        tracing::info!(
            component = %Component::Store,
            runs = report.runs_removed,
            observations = report.observations_removed,
            cooldowns = report.cooldowns_removed,
            "retention sweep removed expired rows"
        );
    }
    report
}
