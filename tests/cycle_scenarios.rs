//! End-to-end cycle tests with in-memory collaborators.
//!
//! Every test drives `CycleRunner::run_cycle` with a scripted observation
//! source, a recording notification channel and a controllable router clock,
//! then checks run records, routed alerts and per-station reports.
//!
//! Run with: cargo test --test cycle_scenarios

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use metar_monitor::alert::channel::{AlertMessage, NotificationChannel};
use metar_monitor::alert::cooldown::MemoryCooldownStore;
use metar_monitor::alert::router::{CooldownRouter, RouteOutcome, RouterPolicy, SuppressReason};
use metar_monitor::config::MonitorConfig;
use metar_monitor::cycle::{AlertDisposition, CycleError, CycleRunner, CycleSummary, StationOutcome};
use metar_monitor::ingest::ObservationSource;
use metar_monitor::model::{
    ChannelRef, FetchResult, MonitorError, Observation, OwnerConfig, RunRecord, RunStatus, StationConfig,
};
use metar_monitor::stations::{MemoryRegistry, Registry};
use metar_monitor::store::memory::{MemoryObservationStore, MemoryRunStore};
use metar_monitor::store::{RunQuery, RunStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const OWNER_CHANNEL: &str = "https://hooks.example/owner-1";
const OPS_CHANNEL: &str = "https://hooks.example/ops";

fn cycle_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap()
}

/// Test config: `extra` wins over the helper's cooldown and worker defaults.
fn config(extra: &str) -> MonitorConfig {
    let mut table: toml::Table = extra.parse().expect("test config is valid TOML");
    table.entry("cooldown_minutes").or_insert(toml::Value::Integer(60));
    table.entry("workers").or_insert(toml::Value::Integer(4));
    let mut config =
        MonitorConfig::from_toml_str(&table.to_string(), Path::new("test.toml")).expect("test config parses");
    config.validate().expect("test config is valid");
    config
}

fn observations(station_id: &str, ages_minutes: &[i64], cycle: DateTime<Utc>) -> FetchResult {
    FetchResult::from_observations(
        ages_minutes
            .iter()
            .map(|age| Observation {
                station_id: station_id.to_string(),
                observation_time: cycle - Duration::minutes(*age),
                raw_text: format!("METAR {} 201000Z AUTO 00000KT 10SM CLR", station_id),
            })
            .collect(),
    )
}

/// Answers each station with a scripted result; unknown stations panic.
#[derive(Default)]
struct ScriptedSource {
    results: Mutex<HashMap<String, FetchResult>>,
    /// Removed from this registry while being fetched.
    vanish: Mutex<Option<(String, Arc<MemoryRegistry>)>>,
}

impl ScriptedSource {
    fn set(&self, station_id: &str, result: FetchResult) {
        self.results.lock().unwrap().insert(station_id.to_string(), result);
    }
}

impl ObservationSource for ScriptedSource {
    fn fetch(&self, station_id: &str) -> FetchResult {
        if let Some((id, registry)) = self.vanish.lock().unwrap().as_ref() {
            if id == station_id {
                registry.remove_station(station_id);
            }
        }
        // Release the lock before panicking so other workers keep going.
        let scripted = self.results.lock().unwrap().get(station_id).cloned();
        scripted.unwrap_or_else(|| panic!("no scripted result for {}", station_id))
    }

    fn source_url(&self, station_id: &str) -> Option<String> {
        Some(format!("https://feed.example/metar?ids={}", station_id))
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(ChannelRef, AlertMessage)>>,
}

impl RecordingChannel {
    fn sent(&self) -> Vec<(ChannelRef, AlertMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn send(&self, channel: &ChannelRef, message: &AlertMessage) -> Result<(), MonitorError> {
        self.sent.lock().unwrap().push((channel.clone(), message.clone()));
        Ok(())
    }
}

/// Run store that refuses writes for one station.
struct FlakyRunStore {
    inner: MemoryRunStore,
    broken_station: String,
}

impl RunStore for FlakyRunStore {
    fn ping(&self) -> Result<(), MonitorError> {
        self.inner.ping()
    }

    fn upsert(&self, record: &RunRecord) -> Result<(), MonitorError> {
        if record.station_id == self.broken_station {
            return Err(MonitorError::Persistence("disk full".into()));
        }
        self.inner.upsert(record)
    }

    fn query(&self, query: &RunQuery) -> Result<Vec<RunRecord>, MonitorError> {
        self.inner.query(query)
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        self.inner.prune(older_than)
    }
}

struct UnreachableRunStore;

impl RunStore for UnreachableRunStore {
    fn ping(&self) -> Result<(), MonitorError> {
        Err(MonitorError::Persistence("connection refused".into()))
    }

    fn upsert(&self, _record: &RunRecord) -> Result<(), MonitorError> {
        panic!("no writes expected after a failed ping")
    }

    fn query(&self, _query: &RunQuery) -> Result<Vec<RunRecord>, MonitorError> {
        Ok(Vec::new())
    }

    fn prune(&self, _older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        Ok(0)
    }
}

struct UnreachableRegistry;

impl Registry for UnreachableRegistry {
    fn enabled_stations(&self) -> Result<Vec<StationConfig>, MonitorError> {
        Err(MonitorError::Persistence("registry offline".into()))
    }

    fn get_station(&self, _station_id: &str) -> Result<Option<StationConfig>, MonitorError> {
        Ok(None)
    }

    fn get_owner(&self, _owner_id: &str) -> Result<Option<OwnerConfig>, MonitorError> {
        Ok(None)
    }
}

/// Lists stations that `get_station` no longer knows about.
struct StaleListingRegistry {
    inner: Arc<MemoryRegistry>,
    ghosts: Vec<String>,
}

impl Registry for StaleListingRegistry {
    fn enabled_stations(&self) -> Result<Vec<StationConfig>, MonitorError> {
        let mut stations = self.inner.enabled_stations()?;
        stations.extend(self.ghosts.iter().map(|id| StationConfig::new(id, None)));
        Ok(stations)
    }

    fn get_station(&self, station_id: &str) -> Result<Option<StationConfig>, MonitorError> {
        self.inner.get_station(station_id)
    }

    fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerConfig>, MonitorError> {
        self.inner.get_owner(owner_id)
    }
}

fn registry_with(stations: &[(&str, Option<&str>)]) -> Arc<MemoryRegistry> {
    let registry = MemoryRegistry::new();
    for (id, owner) in stations {
        registry.upsert_station(StationConfig::new(id, *owner));
    }
    registry.upsert_owner(OwnerConfig {
        owner_id: "owner-1".into(),
        channel: Some(ChannelRef(OWNER_CHANNEL.into())),
        alerts_enabled: true,
    });
    Arc::new(registry)
}

/// Everything a test needs to poke at after a cycle.
struct Harness {
    runner: CycleRunner,
    source: Arc<ScriptedSource>,
    runs: Arc<MemoryRunStore>,
    channel: Arc<RecordingChannel>,
    clock: Arc<Mutex<DateTime<Utc>>>,
}

impl Harness {
    fn new(config: &MonitorConfig, registry: Arc<dyn Registry>) -> Self {
        let source = Arc::new(ScriptedSource::default());
        let runs = Arc::new(MemoryRunStore::new());
        Self::with_runs(config, registry, source, runs.clone(), runs)
    }

    fn with_runs(
        config: &MonitorConfig,
        registry: Arc<dyn Registry>,
        source: Arc<ScriptedSource>,
        run_store: Arc<dyn RunStore>,
        runs: Arc<MemoryRunStore>,
    ) -> Self {
        let channel = Arc::new(RecordingChannel::default());
        let clock = Arc::new(Mutex::new(cycle_start()));
        let router_clock = clock.clone();
        let router = CooldownRouter::new(
            registry.clone(),
            Arc::new(MemoryCooldownStore::new()),
            channel.clone(),
            RouterPolicy::from_config(config),
        )
        .with_clock(Arc::new(move || *router_clock.lock().unwrap()));
        let runner = CycleRunner::new(config, registry, source.clone(), run_store, router);
        Harness {
            runner,
            source,
            runs,
            channel,
            clock,
        }
    }

    /// Run a cycle with the router clock set to the cycle start.
    fn cycle_at(&self, at: DateTime<Utc>) -> CycleSummary {
        *self.clock.lock().unwrap() = at;
        self.runner.run_cycle(at).expect("cycle should run")
    }

    fn records(&self, station_id: &str) -> Vec<RunRecord> {
        self.runs.query(&RunQuery::station(station_id, 100)).unwrap()
    }
}

fn evaluated(summary: &CycleSummary, station_id: &str) -> (RunRecord, AlertDisposition) {
    match &summary.report(station_id).expect("station reported").outcome {
        StationOutcome::Evaluated { record, alert } => (record.clone(), alert.clone()),
        other => panic!("{} was not evaluated: {:?}", station_id, other),
    }
}

fn routed(summary: &CycleSummary, station_id: &str) -> Vec<RouteOutcome> {
    summary
        .alerts_for(station_id)
        .map(|a| a.outcome.clone().expect("routing should not error"))
        .collect()
}

#[test]
fn test_config_overrides_replace_helper_defaults() {
    let defaults = config("");
    assert_eq!(defaults.cooldown_window(), Duration::minutes(60));
    assert_eq!(defaults.workers, 4);

    let tuned = config("cooldown_minutes = 15\nworkers = 3");
    assert_eq!(tuned.cooldown_window(), Duration::minutes(15));
    assert_eq!(tuned.workers, 3);
    assert_eq!(config("cooldown_minutes = 60").cooldown_window(), Duration::minutes(60));
}

// ---------------------------------------------------------------------------
// Status scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_empty_feed_alerts_when_alert_on_empty() {
    let h = Harness::new(&config("alert_on_empty = true"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::Empty);

    let summary = h.cycle_at(cycle_start());
    let (record, alert) = evaluated(&summary, "KJWY");
    assert_eq!(record.status, RunStatus::Empty);
    assert_eq!(alert, AlertDisposition::Emitted);
    assert_eq!(
        routed(&summary, "KJWY"),
        vec![RouteOutcome::Dispatched { channel: ChannelRef(OWNER_CHANNEL.into()) }]
    );
}

#[test]
fn test_empty_feed_is_quiet_without_alert_on_empty() {
    let h = Harness::new(&config("alert_on_empty = false"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::Empty);

    let summary = h.cycle_at(cycle_start());
    let (record, alert) = evaluated(&summary, "KJWY");
    assert_eq!(record.status, RunStatus::Empty);
    assert_eq!(alert, AlertDisposition::NotRequired);
    assert!(summary.alerts.is_empty());
    assert!(h.channel.sent().is_empty());
}

#[test]
fn test_three_hour_old_feed_is_stale_and_alerts() {
    let h = Harness::new(&config("stale_threshold_hours = 2"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", observations("KJWY", &[180, 240], cycle_start()));

    let summary = h.cycle_at(cycle_start());
    let (record, alert) = evaluated(&summary, "KJWY");
    assert_eq!(record.status, RunStatus::Stale);
    assert_eq!(record.newest_observation_time, Some(cycle_start() - Duration::hours(3)));
    assert_eq!(alert, AlertDisposition::Emitted);

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.subject, "METAR STALE - KJWY");
    assert!(
        sent[0].1.body.contains("Source URL: https://feed.example/metar?ids=KJWY\n"),
        "body was {:?}",
        sent[0].1.body
    );
}

#[test]
fn test_fresh_feed_never_alerts() {
    let h = Harness::new(&config(""), registry_with(&[("KJWY", Some("owner-1"))]));
    for cycle in 0..3 {
        let at = cycle_start() + Duration::hours(cycle);
        h.source.set("KJWY", observations("KJWY", &[10], at));
        let summary = h.cycle_at(at);
        assert_eq!(evaluated(&summary, "KJWY").0.status, RunStatus::Ok);
        assert!(summary.alerts.is_empty());
    }
    assert!(h.channel.sent().is_empty());
    assert_eq!(h.records("KJWY").len(), 3);
}

// ---------------------------------------------------------------------------
// Cooldown scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_second_error_inside_window_is_suppressed() {
    let h = Harness::new(&config("cooldown_minutes = 60"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::FetchError("timeout after 20s".into()));

    let first = h.cycle_at(cycle_start());
    let second = h.cycle_at(cycle_start() + Duration::minutes(10));

    assert!(matches!(routed(&first, "KJWY").as_slice(), [RouteOutcome::Dispatched { .. }]));
    assert_eq!(
        routed(&second, "KJWY"),
        vec![RouteOutcome::Suppressed(SuppressReason::Cooldown { last_alert_sent_at: cycle_start() })]
    );
    assert_eq!(h.channel.sent().len(), 1);
    // Suppression does not affect run history.
    assert_eq!(h.records("KJWY").len(), 2);
}

#[test]
fn test_second_error_after_window_dispatches_again() {
    let h = Harness::new(&config("cooldown_minutes = 60"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::FetchError("timeout after 20s".into()));

    h.cycle_at(cycle_start());
    let second = h.cycle_at(cycle_start() + Duration::minutes(70));

    assert!(matches!(routed(&second, "KJWY").as_slice(), [RouteOutcome::Dispatched { .. }]));
    assert_eq!(h.channel.sent().len(), 2);
}

#[test]
fn test_recovery_does_not_reset_cooldown() {
    let h = Harness::new(&config("cooldown_minutes = 60"), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::FetchError("HTTP error: 503".into()));
    h.cycle_at(cycle_start());

    let recovered_at = cycle_start() + Duration::minutes(20);
    h.source.set("KJWY", observations("KJWY", &[5], recovered_at));
    h.cycle_at(recovered_at);

    h.source.set("KJWY", FetchResult::FetchError("HTTP error: 503".into()));
    let relapse = h.cycle_at(cycle_start() + Duration::minutes(40));
    assert!(matches!(
        routed(&relapse, "KJWY").as_slice(),
        [RouteOutcome::Suppressed(SuppressReason::Cooldown { .. })]
    ));
}

#[test]
fn test_pairs_cool_down_independently() {
    let h = Harness::new(
        &config("cooldown_minutes = 60"),
        registry_with(&[("KJWY", Some("owner-1")), ("KPIA", Some("owner-1"))]),
    );
    h.source.set("KJWY", FetchResult::FetchError("timeout after 20s".into()));
    h.source.set("KPIA", observations("KPIA", &[5], cycle_start()));
    h.cycle_at(cycle_start());

    let later = cycle_start() + Duration::minutes(10);
    h.source.set("KPIA", FetchResult::FetchError("timeout after 20s".into()));
    let summary = h.cycle_at(later);
    assert!(matches!(routed(&summary, "KPIA").as_slice(), [RouteOutcome::Dispatched { .. }]));
    assert!(matches!(
        routed(&summary, "KJWY").as_slice(),
        [RouteOutcome::Suppressed(SuppressReason::Cooldown { .. })]
    ));
}

#[test]
fn test_rerunning_a_cycle_keeps_one_record_and_one_dispatch() {
    let h = Harness::new(&config(""), registry_with(&[("KJWY", Some("owner-1"))]));
    h.source.set("KJWY", FetchResult::FetchError("timeout after 20s".into()));

    h.cycle_at(cycle_start());
    let rerun = h.cycle_at(cycle_start());

    assert_eq!(h.records("KJWY").len(), 1);
    assert_eq!(
        routed(&rerun, "KJWY"),
        vec![RouteOutcome::Suppressed(SuppressReason::DuplicateCycle)]
    );
    assert_eq!(h.channel.sent().len(), 1);
}

// ---------------------------------------------------------------------------
// Owner-less routing
// ---------------------------------------------------------------------------

#[test]
fn test_ownerless_station_uses_default_channel() {
    let config = config(&format!("default_channel = \"{}\"", OPS_CHANNEL));
    let h = Harness::new(&config, registry_with(&[("KSPI", None)]));
    h.source.set("KSPI", FetchResult::FetchError("timeout after 20s".into()));

    let summary = h.cycle_at(cycle_start());
    assert_eq!(
        routed(&summary, "KSPI"),
        vec![RouteOutcome::Dispatched { channel: ChannelRef(OPS_CHANNEL.into()) }]
    );
    assert_eq!(h.channel.sent()[0].1.owner_id, "");
}

#[test]
fn test_ownerless_station_without_default_channel_is_unrouted() {
    let h = Harness::new(&config(""), registry_with(&[("KSPI", None)]));
    h.source.set("KSPI", FetchResult::FetchError("timeout after 20s".into()));

    let summary = h.cycle_at(cycle_start());
    assert_eq!(routed(&summary, "KSPI"), vec![RouteOutcome::Suppressed(SuppressReason::Unrouted)]);
    assert!(h.channel.sent().is_empty());
    assert_eq!(summary.counts().suppressed, 1);
}

// ---------------------------------------------------------------------------
// Registry churn
// ---------------------------------------------------------------------------

#[test]
fn test_station_removed_after_listing_is_skipped() {
    let inner = registry_with(&[("KJWY", Some("owner-1"))]);
    let registry = Arc::new(StaleListingRegistry {
        inner,
        ghosts: vec!["KGONE".to_string()],
    });
    let h = Harness::new(&config(""), registry);
    h.source.set("KJWY", observations("KJWY", &[5], cycle_start()));

    let summary = h.cycle_at(cycle_start());
    assert!(matches!(
        summary.report("KGONE").unwrap().outcome,
        StationOutcome::Skipped { .. }
    ));
    assert!(h.records("KGONE").is_empty());
    assert_eq!(summary.counts().skipped, 1);
}

#[test]
fn test_station_removed_before_emission_is_not_alerted() {
    let registry = registry_with(&[("KJWY", Some("owner-1"))]);
    let h = Harness::new(&config(""), registry.clone());
    h.source.set("KJWY", FetchResult::FetchError("timeout after 20s".into()));
    *h.source.vanish.lock().unwrap() = Some(("KJWY".to_string(), registry));

    let summary = h.cycle_at(cycle_start());
    let (record, alert) = evaluated(&summary, "KJWY");
    assert_eq!(record.status, RunStatus::Error);
    assert_eq!(alert, AlertDisposition::StationGone);
    assert!(summary.alerts.is_empty());
    assert!(h.channel.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Isolation and deadlines
// ---------------------------------------------------------------------------

#[test]
fn test_run_store_failure_is_isolated_to_one_station() {
    let config = config("");
    let registry = registry_with(&[("KBAD", None), ("KJWY", Some("owner-1")), ("KPIA", None)]);
    let source = Arc::new(ScriptedSource::default());
    for id in ["KBAD", "KJWY", "KPIA"] {
        source.set(id, observations(id, &[5], cycle_start()));
    }
    let runs = Arc::new(MemoryRunStore::new());
    let flaky = Arc::new(FlakyRunStore {
        inner: MemoryRunStore::new(),
        broken_station: "KBAD".into(),
    });
    let h = Harness::with_runs(&config, registry, source, flaky.clone(), runs);

    let summary = h.cycle_at(cycle_start());
    assert!(matches!(summary.report("KBAD").unwrap().outcome, StationOutcome::Failed { .. }));
    assert_eq!(evaluated(&summary, "KJWY").0.status, RunStatus::Ok);
    assert_eq!(evaluated(&summary, "KPIA").0.status, RunStatus::Ok);
    assert_eq!(flaky.inner.len(), 2);
    assert_eq!(summary.counts().failed, 1);
}

#[test]
fn test_panicking_station_is_reported_and_others_continue() {
    let h = Harness::new(&config(""), registry_with(&[("KJWY", Some("owner-1")), ("KNONE", None)]));
    h.source.set("KJWY", observations("KJWY", &[5], cycle_start()));
    // KNONE has no scripted result, so the source panics for it.

    let summary = h.cycle_at(cycle_start());
    match &summary.report("KNONE").unwrap().outcome {
        StationOutcome::Failed { error } => assert!(error.contains("no scripted result"), "error was {}", error),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(evaluated(&summary, "KJWY").0.status, RunStatus::Ok);
}

#[test]
fn test_stations_past_deadline_are_not_evaluated() {
    let config = config("");
    let registry = registry_with(&[("KJWY", Some("owner-1")), ("KPIA", None)]);
    let source = Arc::new(ScriptedSource::default());
    let runs = Arc::new(MemoryRunStore::new());
    let mut h = Harness::with_runs(&config, registry, source, runs.clone(), runs);
    h.runner = h.runner.with_deadline(StdDuration::ZERO);

    let summary = h.cycle_at(cycle_start());
    assert_eq!(summary.counts().not_evaluated, 2);
    assert!(summary.reports.iter().all(|r| r.outcome == StationOutcome::NotEvaluated));
    assert!(h.runs.is_empty());
}

#[test]
fn test_reports_follow_registry_order() {
    let ids = ["KBMI", "KDEC", "KJWY", "KPIA", "KSPI", "KUIN"];
    let stations: Vec<_> = ids.iter().map(|id| (*id, None)).collect();
    let h = Harness::new(&config("workers = 3"), registry_with(&stations));
    for id in ids {
        h.source.set(id, observations(id, &[5], cycle_start()));
    }

    let summary = h.cycle_at(cycle_start());
    let reported: Vec<_> = summary.reports.iter().map(|r| r.station_id.as_str()).collect();
    assert_eq!(reported, ids);
    assert_eq!(summary.counts().ok, ids.len());
}

#[test]
fn test_observations_are_archived() {
    let config = config("");
    let registry = registry_with(&[("KJWY", None)]);
    let source = Arc::new(ScriptedSource::default());
    source.set("KJWY", observations("KJWY", &[5, 65], cycle_start()));
    let runs = Arc::new(MemoryRunStore::new());
    let mut h = Harness::with_runs(&config, registry, source, runs.clone(), runs);
    let archive = Arc::new(MemoryObservationStore::new());
    h.runner = h.runner.with_observation_store(archive.clone());

    h.cycle_at(cycle_start());
    h.cycle_at(cycle_start() + Duration::minutes(5));
    assert_eq!(archive.len(), 2);
}

#[test]
fn test_cycle_time_is_truncated_to_whole_seconds() {
    let h = Harness::new(&config(""), registry_with(&[("KJWY", None)]));
    h.source.set("KJWY", observations("KJWY", &[5], cycle_start()));

    let summary = h.cycle_at(cycle_start() + Duration::milliseconds(750));
    assert_eq!(summary.cycle_at, cycle_start());
    assert_eq!(h.records("KJWY")[0].checked_at, cycle_start());
}

// ---------------------------------------------------------------------------
// Fatal preconditions
// ---------------------------------------------------------------------------

#[test]
fn test_unreachable_registry_aborts_cycle() {
    let h = Harness::new(&config(""), Arc::new(UnreachableRegistry));
    let err = h.runner.run_cycle(cycle_start()).unwrap_err();
    assert!(matches!(err, CycleError::RegistryUnavailable(_)));
}

#[test]
fn test_unreachable_run_store_aborts_cycle() {
    let config = config("");
    let source = Arc::new(ScriptedSource::default());
    let runs = Arc::new(MemoryRunStore::new());
    let h = Harness::with_runs(
        &config,
        registry_with(&[("KJWY", None)]),
        source,
        Arc::new(UnreachableRunStore),
        runs,
    );
    let err = h.runner.run_cycle(cycle_start()).unwrap_err();
    assert!(matches!(err, CycleError::RunStoreUnavailable(_)));
}
