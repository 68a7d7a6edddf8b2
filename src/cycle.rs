//! Polling cycle orchestration.
//!
//! A cycle evaluates every enabled station on a bounded pool of scoped
//! threads. All stations share the cycle start time. Alert events go through
//! a channel to a single router thread, so routing (and slow notification
//! providers) never hold up run-record writes.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, SubsecRound, Utc};

use crate::alert::emitter::{AlertEmitter, EmitOutcome};
use crate::alert::evaluator::StatusEvaluator;
use crate::alert::router::{CooldownRouter, RouteOutcome, RoutedAlert};
use crate::config::MonitorConfig;
use crate::ingest::ObservationSource;
use crate::logging::{self, Component};
use crate::model::{AlertEvent, FetchResult, MonitorError, RunRecord};
use crate::stations::Registry;
use crate::store::{ObservationStore, RunStore};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("station registry unavailable: {0}")]
    RegistryUnavailable(MonitorError),
    #[error("run store unavailable: {0}")]
    RunStoreUnavailable(MonitorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDisposition {
    NotRequired,
    Emitted,
    /// Station left the registry between evaluation and emission.
    StationGone,
    EmitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationOutcome {
    Evaluated { record: RunRecord, alert: AlertDisposition },
    Skipped { reason: String },
    Failed { error: String },
    /// Not started before the cycle deadline.
    NotEvaluated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReport {
    pub station_id: String,
    pub outcome: StationOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounts {
    pub total: usize,
    pub evaluated: usize,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_evaluated: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub dispatch_failed: usize,
}

#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub cycle_at: DateTime<Utc>,
    /// One report per station, in registry order.
    pub reports: Vec<StationReport>,
    /// Routing results, in the order the router received the events.
    pub alerts: Vec<RoutedAlert>,
}

impl CycleSummary {
    pub fn counts(&self) -> CycleCounts {
        let mut counts = CycleCounts {
            total: self.reports.len(),
            ..Default::default()
        };
        for report in &self.reports {
            match &report.outcome {
                StationOutcome::Evaluated { record, .. } => {
                    counts.evaluated += 1;
                    if !record.status.is_bad() {
                        counts.ok += 1;
                    }
                }
                StationOutcome::Skipped { .. } => counts.skipped += 1,
                StationOutcome::Failed { .. } => counts.failed += 1,
                StationOutcome::NotEvaluated => counts.not_evaluated += 1,
            }
        }
        for alert in &self.alerts {
            match &alert.outcome {
                Ok(RouteOutcome::Dispatched { .. }) => counts.dispatched += 1,
                Ok(RouteOutcome::Suppressed(_)) => counts.suppressed += 1,
                Ok(RouteOutcome::Failed { .. }) | Err(_) => counts.dispatch_failed += 1,
            }
        }
        counts
    }

    pub fn report(&self, station_id: &str) -> Option<&StationReport> {
        self.reports.iter().find(|r| r.station_id == station_id)
    }

    pub fn alerts_for(&self, station_id: &str) -> impl Iterator<Item = &RoutedAlert> {
        self.alerts.iter().filter(move |a| a.station_id == station_id)
    }
}

pub struct CycleRunner {
    registry: Arc<dyn Registry>,
    source: Arc<dyn ObservationSource>,
    runs: Arc<dyn RunStore>,
    observations: Option<Arc<dyn ObservationStore>>,
    router: CooldownRouter,
    evaluator: StatusEvaluator,
    workers: usize,
    deadline: StdDuration,
}

impl CycleRunner {
    pub fn new(
        config: &MonitorConfig,
        registry: Arc<dyn Registry>,
        source: Arc<dyn ObservationSource>,
        runs: Arc<dyn RunStore>,
        router: CooldownRouter,
    ) -> Self {
        CycleRunner {
            registry,
            source,
            runs,
            observations: None,
            router,
            evaluator: StatusEvaluator::from_config(config),
            workers: config.workers.max(1),
            deadline: config.cycle_deadline(),
        }
    }

    pub fn with_observation_store(mut self, store: Arc<dyn ObservationStore>) -> Self {
        self.observations = Some(store);
        self
    }

    pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn run_cycle_now(&self) -> Result<CycleSummary, CycleError> {
        self.run_cycle(Utc::now())
    }

    /// Run one cycle. Fails only when the registry or run store cannot be
    /// reached up front; everything after that is reported per station.
    pub fn run_cycle(&self, cycle_at: DateTime<Utc>) -> Result<CycleSummary, CycleError> {
        let cycle_at = cycle_at.trunc_subsecs(0);
        let stations: Vec<String> = self
            .registry
            .enabled_stations()
            .map_err(CycleError::RegistryUnavailable)?
            .into_iter()
            .map(|s| s.station_id)
            .collect();
        self.runs.ping().map_err(CycleError::RunStoreUnavailable)?;

        tracing::info!(
            component = %Component::System,
            cycle_at = %cycle_at.to_rfc3339(),
            stations = stations.len(),
            "starting cycle"
        );

        let started = Instant::now();
        let next = AtomicUsize::new(0);
        let pool = self.workers.min(stations.len());
        let (tx, rx) = mpsc::channel::<AlertEvent>();

        let (mut indexed, alerts) = thread::scope(|scope| {
            let router = scope.spawn(|| self.router.drain(rx));

            let handles: Vec<_> = (0..pool)
                .map(|_| {
                    let sender = tx.clone();
                    let stations = &stations;
                    let next = &next;
                    scope.spawn(move || self.work(stations, next, sender, cycle_at, started))
                })
                .collect();
            drop(tx);

            let mut indexed = Vec::with_capacity(stations.len());
            for handle in handles {
                match handle.join() {
                    Ok(reports) => indexed.extend(reports),
                    Err(_) => tracing::error!(component = %Component::System, "cycle worker panicked"),
                }
            }
            let alerts = router.join().unwrap_or_else(|_| {
                tracing::error!(component = %Component::Router, "router thread panicked");
                Vec::new()
            });
            (indexed, alerts)
        });

        indexed.sort_by_key(|(i, _)| *i);
        let summary = CycleSummary {
            cycle_at,
            reports: indexed.into_iter().map(|(_, r)| r).collect(),
            alerts,
        };
        logging::log_cycle_summary(&summary);
        Ok(summary)
    }

    fn work(
        &self,
        stations: &[String],
        next: &AtomicUsize,
        sender: Sender<AlertEvent>,
        cycle_at: DateTime<Utc>,
        started: Instant,
    ) -> Vec<(usize, StationReport)> {
        let emitter = AlertEmitter::new(Arc::clone(&self.registry), sender);
        let mut reports = Vec::new();
        loop {
            let i = next.fetch_add(1, Ordering::SeqCst);
            let Some(station_id) = stations.get(i) else { break };

            let outcome = if started.elapsed() >= self.deadline {
                StationOutcome::NotEvaluated
            } else {
                panic::catch_unwind(AssertUnwindSafe(|| self.process_station(station_id, cycle_at, &emitter)))
                    .unwrap_or_else(|payload| {
                        let error = panic_message(payload.as_ref());
                        tracing::error!(
                            component = %Component::Evaluator,
                            station_id = %station_id,
                            "station evaluation panicked: {}",
                            error
                        );
                        StationOutcome::Failed { error }
                    })
            };
            reports.push((
                i,
                StationReport {
                    station_id: station_id.clone(),
                    outcome,
                },
            ));
        }
        reports
    }

    fn process_station(
        &self,
        station_id: &str,
        cycle_at: DateTime<Utc>,
        emitter: &AlertEmitter<Sender<AlertEvent>>,
    ) -> StationOutcome {
        // The registry may have changed since the cycle listed its stations.
        match self.registry.get_station(station_id) {
            Ok(Some(station)) if station.enabled => {}
            Ok(Some(_)) => {
                return StationOutcome::Skipped {
                    reason: "station disabled".into(),
                };
            }
            Ok(None) => {
                return StationOutcome::Skipped {
                    reason: "station removed from registry".into(),
                };
            }
            Err(e) => return StationOutcome::Failed { error: e.to_string() },
        }

        let fetch = self.source.fetch(station_id);

        if let (Some(store), FetchResult::Observations(observations)) = (&self.observations, &fetch) {
            if let Err(e) = store.upsert_observations(observations, cycle_at) {
                tracing::warn!(component = %Component::Store, station_id, "observation archive write failed: {}", e);
            }
        }

        let record = self
            .evaluator
            .evaluate_with_history(self.runs.as_ref(), station_id, cycle_at, &fetch);

        let alert = if self.evaluator.should_alert(record.status) {
            let source_url = self.source.source_url(station_id);
            match emitter.emit(station_id, cycle_at, record.status, &record.detail, source_url.as_deref()) {
                Ok(EmitOutcome::Emitted { .. }) => AlertDisposition::Emitted,
                Ok(EmitOutcome::StationGone) => AlertDisposition::StationGone,
                Err(e) => {
                    tracing::error!(component = %Component::Router, station_id, "alert emission failed: {}", e);
                    AlertDisposition::EmitFailed(e.to_string())
                }
            }
        } else {
            AlertDisposition::NotRequired
        };

        if let Err(e) = self.runs.upsert(&record) {
            tracing::error!(
                component = %Component::Store,
                station_id,
                status = %record.status,
                "run record write failed: {}",
                e
            );
            return StationOutcome::Failed { error: e.to_string() };
        }

        tracing::debug!(
            component = %Component::Evaluator,
            station_id,
            status = %record.status,
            observations = record.observation_count,
            "station evaluated"
        );
        StationOutcome::Evaluated { record, alert }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic during evaluation".to_string()
    }
}
