//! Station status evaluation.
//!
//! Turns one station's fetch outcome for one cycle into a `RunRecord` and
//! decides whether the outcome deserves an alert.

use chrono::{DateTime, Duration, Utc};

use crate::alert::stalenesses::{format_age, is_stale_at, observation_age};
use crate::config::MonitorConfig;
use crate::logging::Component;
use crate::model::{FetchResult, RunRecord, RunStatus};
use crate::store::RunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvaluator {
    stale_threshold: Duration,
    alert_on_empty: bool,
}

impl StatusEvaluator {
    pub fn new(stale_threshold: Duration, alert_on_empty: bool) -> Self {
        StatusEvaluator {
            stale_threshold,
            alert_on_empty,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.stale_threshold(), config.alert_on_empty)
    }

    /// Classify a fetch outcome.
    ///
    /// `previous_newest` is the newest observation time known from earlier
    /// cycles; it is only carried into the record when the fetch failed.
    pub fn evaluate(
        &self,
        station_id: &str,
        cycle_time: DateTime<Utc>,
        fetch: &FetchResult,
        previous_newest: Option<DateTime<Utc>>,
    ) -> RunRecord {
        let (status, newest, detail) = match fetch {
            FetchResult::FetchError(reason) => (RunStatus::Error, previous_newest, reason.clone()),
            FetchResult::Empty => (RunStatus::Empty, None, "feed returned no observations".to_string()),
            FetchResult::Observations(_) => {
                // Observations is non-empty by construction; a missing time
                // would be a source bug, so report it as an error.
                match fetch.newest_observation_time() {
                    Some(newest) if is_stale_at(newest, self.stale_threshold, cycle_time) => (
                        RunStatus::Stale,
                        Some(newest),
                        format!(
                            "newest observation is {} old (threshold {}h)",
                            format_age(observation_age(newest, cycle_time)),
                            self.stale_threshold.num_hours()
                        ),
                    ),
                    Some(newest) => (RunStatus::Ok, Some(newest), String::new()),
                    None => (RunStatus::Error, previous_newest, "observations without timestamps".to_string()),
                }
            }
        };

        RunRecord {
            station_id: station_id.to_string(),
            checked_at: cycle_time,
            status,
            newest_observation_time: newest,
            observation_count: u32::try_from(fetch.observation_count()).unwrap_or(u32::MAX),
            detail,
        }
    }

    /// Alerts go out for error and stale always, for empty only when
    /// configured, never for ok.
    pub fn should_alert(&self, status: RunStatus) -> bool {
        match status {
            RunStatus::Ok => false,
            RunStatus::Error | RunStatus::Stale => true,
            RunStatus::Empty => self.alert_on_empty,
        }
    }

    /// `evaluate` with the previous observation time read from `runs`.
    /// History is only looked up for failed fetches; a failed lookup just
    /// leaves it unset. Persisting the record is up to the caller.
    pub fn evaluate_with_history(
        &self,
        runs: &dyn RunStore,
        station_id: &str,
        cycle_time: DateTime<Utc>,
        fetch: &FetchResult,
    ) -> RunRecord {
        let previous = match fetch {
            FetchResult::FetchError(_) => runs.latest_newest_observation(station_id).unwrap_or_else(|e| {
                tracing::warn!(component = %Component::Evaluator, station_id, "previous observation lookup failed: {}", e);
                None
            }),
            _ => None,
        };
        self.evaluate(station_id, cycle_time, fetch, previous)
    }
}
