//! Monitor configuration.
//!
//! All tunables live in one `MonitorConfig` that is loaded once at startup
//! (TOML file, then environment overrides) and handed to each component at
//! construction. Nothing below this module reads the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_SOURCE_URL: &str = "https://aviationweather.gov/api/data/metar";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorConfig {
    /// Newest observation older than this many hours marks a station stale.
    #[serde(default = "default_stale_threshold_hours")]
    pub stale_threshold_hours: u32,
    #[serde(default = "default_true")]
    pub alert_on_empty: bool,
    #[serde(default = "default_retention_days")]
    pub metar_retention_days: u32,
    #[serde(default = "default_retention_days")]
    pub run_retention_days: u32,
    /// Cooldown entries whose last dispatch is older than this are swept.
    #[serde(default = "default_retention_days")]
    pub cooldown_retention_days: u32,
    /// Minimum minutes between two dispatched alerts for one station/owner
    /// pair. Required: there is no implicit default.
    pub cooldown_minutes: Option<u32>,
    /// Whether a failed dispatch still uses up the cooldown window.
    #[serde(default = "default_true")]
    pub spend_cooldown_on_dispatch_failure: bool,
    /// Where alerts for stations without an owner go. Unset means such
    /// alerts are reported as unrouted.
    #[serde(default)]
    pub default_channel: Option<String>,

    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_cycle_deadline_secs")]
    pub cycle_deadline_secs: u64,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,

    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: f64,
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_stale_threshold_hours() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_retention_days() -> u32 {
    30
}
fn default_workers() -> usize {
    8
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_cycle_deadline_secs() -> u64 {
    300
}
fn default_poll_interval_minutes() -> u64 {
    60
}
fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_lookback_hours() -> f64 {
    2.5
}
fn default_registry_path() -> PathBuf {
    PathBuf::from("stations.toml")
}

impl MonitorConfig {
    /// Parses a TOML document. Validation is separate; see `validate`.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the file, applies environment overrides through `env`, and
    /// validates the result.
    pub fn load(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw, path)?;
        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays recognized environment variables. Unset variables leave the
    /// file value in place; malformed ones are rejected.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = env("STALE_THRESHOLD_HOURS") {
            self.stale_threshold_hours = parse_var("STALE_THRESHOLD_HOURS", &v)?;
        }
        if let Some(v) = env("ALERT_ON_EMPTY") {
            self.alert_on_empty = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = env("METAR_RETENTION_DAYS") {
            self.metar_retention_days = parse_var("METAR_RETENTION_DAYS", &v)?;
        }
        if let Some(v) = env("RUN_RETENTION_DAYS") {
            self.run_retention_days = parse_var("RUN_RETENTION_DAYS", &v)?;
        }
        if let Some(v) = env("COOLDOWN_RETENTION_DAYS") {
            self.cooldown_retention_days = parse_var("COOLDOWN_RETENTION_DAYS", &v)?;
        }
        if let Some(v) = env("COOLDOWN_MINUTES") {
            self.cooldown_minutes = Some(parse_var("COOLDOWN_MINUTES", &v)?);
        }
        if let Some(v) = env("LOOKBACK_HOURS") {
            self.lookback_hours = parse_var("LOOKBACK_HOURS", &v)?;
        }
        if let Some(v) = env("DEFAULT_CHANNEL") {
            self.default_channel = Some(v).filter(|c| !c.trim().is_empty());
        }
        if let Some(v) = env("DATABASE_URL") {
            self.database_url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let cooldown_minutes = match self.cooldown_minutes {
            None => return Err(ConfigError::Invalid("cooldown_minutes must be set explicitly".into())),
            Some(0) => return Err(ConfigError::Invalid("cooldown_minutes must be greater than zero".into())),
            Some(minutes) => minutes,
        };
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be greater than zero".into()));
        }
        if self.cycle_deadline_secs == 0 {
            return Err(ConfigError::Invalid("cycle_deadline_secs must be greater than zero".into()));
        }
        if self.poll_interval_minutes == 0 {
            return Err(ConfigError::Invalid("poll_interval_minutes must be greater than zero".into()));
        }
        if !(self.lookback_hours > 0.0) {
            return Err(ConfigError::Invalid("lookback_hours must be positive".into()));
        }
        // Retention below one day would purge records before anyone reads them.
        self.metar_retention_days = self.metar_retention_days.max(1);
        self.run_retention_days = self.run_retention_days.max(1);
        // A swept entry must already be outside the global cooldown window.
        let window_days = cooldown_minutes.div_ceil(24 * 60);
        self.cooldown_retention_days = self.cooldown_retention_days.max(window_days).max(1);
        Ok(())
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::hours(i64::from(self.stale_threshold_hours))
    }

    /// Only meaningful after `validate` has succeeded.
    pub fn cooldown_window(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes.unwrap_or(0)))
    }

    pub fn fetch_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.fetch_timeout_secs)
    }

    pub fn cycle_deadline(&self) -> StdDuration {
        StdDuration::from_secs(self.cycle_deadline_secs)
    }

    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.poll_interval_minutes * 60)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has invalid value '{}'", name, raw)))
}
