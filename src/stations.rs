//! Station registry for the METAR monitor.
//!
//! The registry maps stations to owners and owners to notification channels.
//! The monitoring core only reads it; stations and owners are managed by
//! admin tooling outside this crate. `MemoryRegistry` is the implementation
//! used by the daemon (loaded from a TOML file) and by tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::model::{
    is_valid_station_id, normalize_station_id, ChannelRef, MonitorError, OwnerConfig, StationConfig,
};

// ---------------------------------------------------------------------------
// Registry interface
// ---------------------------------------------------------------------------

/// Read-only view of tracked stations and their owners.
///
/// `Ok(None)` means "not found"; `Err` means the registry could not be read.
pub trait Registry: Send + Sync {
    /// Enabled stations, sorted by station id.
    fn enabled_stations(&self) -> Result<Vec<StationConfig>, MonitorError>;

    fn get_station(&self, station_id: &str) -> Result<Option<StationConfig>, MonitorError>;

    fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerConfig>, MonitorError>;

    /// The owner's channel, if the owner exists and has one configured.
    fn get_owner_channel(&self, owner_id: &str) -> Result<Option<ChannelRef>, MonitorError> {
        Ok(self.get_owner(owner_id)?.and_then(|o| o.channel))
    }
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    stations: Vec<StationConfig>,
    #[serde(default)]
    owners: Vec<OwnerConfig>,
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    stations: RwLock<BTreeMap<String, StationConfig>>,
    owners: RwLock<BTreeMap<String, OwnerConfig>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry file of the form:
    ///
    /// ```toml
    /// [[stations]]
    /// station_id = "KJWY"
    /// owner_id = "owner-1"
    /// notify_on = "both"
    ///
    /// [[owners]]
    /// owner_id = "owner-1"
    /// channel = "https://hooks.example/owner-1"
    /// ```
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: RegistryFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = MemoryRegistry::new();
        for station in file.stations {
            let id = normalize_station_id(&station.station_id);
            if !is_valid_station_id(&id) {
                return Err(ConfigError::Invalid(format!("invalid station id '{}'", station.station_id)));
            }
            if registry.get_station(&id).ok().flatten().is_some() {
                return Err(ConfigError::Invalid(format!("duplicate station id '{}'", id)));
            }
            registry.upsert_station(station);
        }
        for owner in file.owners {
            registry.upsert_owner(owner);
        }
        Ok(registry)
    }

    pub fn upsert_station(&self, mut station: StationConfig) {
        station.station_id = normalize_station_id(&station.station_id);
        write_lock(&self.stations).insert(station.station_id.clone(), station);
    }

    pub fn remove_station(&self, station_id: &str) -> Option<StationConfig> {
        write_lock(&self.stations).remove(&normalize_station_id(station_id))
    }

    pub fn upsert_owner(&self, owner: OwnerConfig) {
        write_lock(&self.owners).insert(owner.owner_id.trim().to_string(), owner);
    }

    pub fn station_count(&self) -> usize {
        read_lock(&self.stations).len()
    }
}

impl Registry for MemoryRegistry {
    fn enabled_stations(&self) -> Result<Vec<StationConfig>, MonitorError> {
        // BTreeMap iteration is already ordered by station id.
        Ok(read_lock(&self.stations).values().filter(|s| s.enabled).cloned().collect())
    }

    fn get_station(&self, station_id: &str) -> Result<Option<StationConfig>, MonitorError> {
        Ok(read_lock(&self.stations).get(&normalize_station_id(station_id)).cloned())
    }

    fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerConfig>, MonitorError> {
        Ok(read_lock(&self.owners).get(owner_id.trim()).cloned())
    }
}

// A poisoned lock only means another thread panicked mid-insert of a whole
// entry; the map itself is still consistent.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
