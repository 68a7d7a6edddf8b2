//! METAR station health monitor.
//!
//! Polls each registered station's METAR feed once per cycle, records the
//! outcome, and notifies the station's owner when the feed errors, comes back
//! empty, or goes stale, at most once per cooldown window.

pub mod alert;
pub mod config;
pub mod cycle;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod stations;
pub mod store;
