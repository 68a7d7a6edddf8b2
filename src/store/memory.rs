//! In-process stores, used by tests and for dry runs without a database.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::model::{MonitorError, Observation, RunRecord};
use crate::store::{ObservationStore, RunQuery, RunStore};

type RunKey = (String, DateTime<Utc>);

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    records: RwLock<BTreeMap<RunKey, RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<RunKey, RunRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<RunKey, RunRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunStore for MemoryRunStore {
    fn ping(&self) -> Result<(), MonitorError> {
        Ok(())
    }

    fn upsert(&self, record: &RunRecord) -> Result<(), MonitorError> {
        self.write()
            .insert((record.station_id.clone(), record.checked_at), record.clone());
        Ok(())
    }

    fn query(&self, query: &RunQuery) -> Result<Vec<RunRecord>, MonitorError> {
        let mut matching: Vec<RunRecord> = self
            .read()
            .values()
            .filter(|r| query.station_id.as_deref().is_none_or(|s| r.station_id == s))
            .filter(|r| query.range.contains(r.checked_at))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.checked_at
                .cmp(&a.checked_at)
                .then_with(|| a.station_id.cmp(&b.station_id))
        });
        matching.truncate(query.limit);
        Ok(matching)
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|(_, checked_at), _| *checked_at >= older_than);
        Ok(before - records.len())
    }
}

#[derive(Debug, Default)]
pub struct MemoryObservationStore {
    observations: RwLock<BTreeMap<RunKey, Observation>>,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observations.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObservationStore for MemoryObservationStore {
    fn upsert_observations(
        &self,
        observations: &[Observation],
        _collected_at: DateTime<Utc>,
    ) -> Result<usize, MonitorError> {
        let mut stored = self.observations.write().unwrap_or_else(|e| e.into_inner());
        for obs in observations {
            stored.insert((obs.station_id.clone(), obs.observation_time), obs.clone());
        }
        Ok(observations.len())
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let mut stored = self.observations.write().unwrap_or_else(|e| e.into_inner());
        let before = stored.len();
        stored.retain(|(_, observed_at), _| *observed_at >= older_than);
        Ok(before - stored.len())
    }
}
