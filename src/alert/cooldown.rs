//! Cooldown state for alert routing.
//!
//! One `CooldownState` per (station, owner) pair. The only mutation is
//! `try_claim`, an atomic check-and-set: the caller either gets the window
//! (and the state already records the new dispatch time) or learns why not.
//! Two concurrent claims for the same pair can never both succeed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::model::MonitorError;

/// Owner-less alerts share the station's default-route key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub station_id: String,
    pub owner_id: Option<String>,
}

impl CooldownKey {
    pub fn new(station_id: &str, owner_id: Option<&str>) -> Self {
        CooldownKey {
            station_id: station_id.to_string(),
            owner_id: owner_id.map(String::from),
        }
    }

    /// Storage form of the owner part; empty for the default route.
    pub fn owner_key(&self) -> &str {
        self.owner_id.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownState {
    pub last_alert_sent_at: DateTime<Utc>,
    /// Cycle of the event that was last dispatched.
    pub last_cycle_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Window was cool; state now holds the new dispatch. `previous` is what
    /// it held before, for `release`.
    Granted {
        claimed: CooldownState,
        previous: Option<CooldownState>,
    },
    /// Last dispatch was less than a window ago.
    Hot { last_alert_sent_at: DateTime<Utc> },
    /// This very cycle was already dispatched for the pair.
    Duplicate,
}

/// Pure claim decision shared by every store implementation.
pub fn decide(
    current: Option<CooldownState>,
    cycle_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> Claim {
    let claimed = CooldownState {
        last_alert_sent_at: now,
        last_cycle_at: cycle_at,
    };
    match current {
        None => Claim::Granted { claimed, previous: None },
        Some(state) if state.last_cycle_at == cycle_at => Claim::Duplicate,
        // A clock running backwards yields a negative age, which is hot.
        Some(state) if now - state.last_alert_sent_at < window => Claim::Hot {
            last_alert_sent_at: state.last_alert_sent_at,
        },
        Some(state) => Claim::Granted {
            claimed,
            previous: Some(state),
        },
    }
}

pub trait CooldownStore: Send + Sync {
    /// Atomically decide and, when granted, record the new dispatch.
    fn try_claim(
        &self,
        key: &CooldownKey,
        cycle_at: DateTime<Utc>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, MonitorError>;

    /// Undo a granted claim, but only if nothing has claimed the pair since.
    fn release(
        &self,
        key: &CooldownKey,
        claimed: &CooldownState,
        previous: Option<CooldownState>,
    ) -> Result<(), MonitorError>;

    fn get(&self, key: &CooldownKey) -> Result<Option<CooldownState>, MonitorError>;

    /// Drop pairs whose last dispatch is strictly before `older_than`.
    /// Returns how many were removed.
    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError>;
}

/// In-process cooldown store. The claim runs entirely under one short,
/// non-blocking critical section.
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    states: Mutex<HashMap<CooldownKey, CooldownState>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CooldownKey, CooldownState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn try_claim(
        &self,
        key: &CooldownKey,
        cycle_at: DateTime<Utc>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, MonitorError> {
        let mut states = self.lock();
        let claim = decide(states.get(key).copied(), cycle_at, now, window);
        if let Claim::Granted { claimed, .. } = claim {
            states.insert(key.clone(), claimed);
        }
        Ok(claim)
    }

    fn release(
        &self,
        key: &CooldownKey,
        claimed: &CooldownState,
        previous: Option<CooldownState>,
    ) -> Result<(), MonitorError> {
        let mut states = self.lock();
        if states.get(key) != Some(claimed) {
            return Ok(());
        }
        match previous {
            Some(state) => states.insert(key.clone(), state),
            None => states.remove(key),
        };
        Ok(())
    }

    fn get(&self, key: &CooldownKey) -> Result<Option<CooldownState>, MonitorError> {
        Ok(self.lock().get(key).copied())
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let mut states = self.lock();
        let before = states.len();
        states.retain(|_, state| state.last_alert_sent_at >= older_than);
        Ok(before - states.len())
    }
}
