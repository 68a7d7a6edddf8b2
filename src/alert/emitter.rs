//! Alert emission.
//!
//! The emitter resolves the station's *current* owner and alert policy at
//! emission time, stamps them onto an `AlertEvent`, and hands the event to
//! a sink without waiting for routing. Duplicate emissions for the same
//! (station, cycle) are absorbed by the router's cooldown claim.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};

use crate::logging::Component;
use crate::model::{AlertEvent, MonitorError, RunStatus, StationConfig};
use crate::stations::Registry;

/// Destination of emitted events.
pub trait AlertSink: Send + Sync {
    fn submit(&self, event: AlertEvent);
}

impl AlertSink for Sender<AlertEvent> {
    fn submit(&self, event: AlertEvent) {
        if let Err(err) = self.send(event) {
            let event = err.0;
            tracing::error!(
                component = %Component::Router,
                station_id = %event.station_id,
                status = %event.status,
                "router queue closed, alert dropped"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Emitted { owner_id: Option<String> },
    /// Station was removed from the registry before emission.
    StationGone,
}

pub struct AlertEmitter<S: AlertSink> {
    registry: Arc<dyn Registry>,
    sink: S,
}

impl<S: AlertSink> AlertEmitter<S> {
    pub fn new(registry: Arc<dyn Registry>, sink: S) -> Self {
        AlertEmitter { registry, sink }
    }

    pub fn emit(
        &self,
        station_id: &str,
        cycle_time: DateTime<Utc>,
        status: RunStatus,
        reason: &str,
        source_url: Option<&str>,
    ) -> Result<EmitOutcome, MonitorError> {
        let Some(station) = self.registry.get_station(station_id)? else {
            tracing::info!(component = %Component::Router, station_id, "station removed before alert emission, skipping");
            return Ok(EmitOutcome::StationGone);
        };
        let event = build_event(&station, cycle_time, status, reason, source_url);
        let owner_id = event.owner_id.clone();
        tracing::debug!(
            component = %Component::Router,
            station_id,
            owner_id = owner_id.as_deref().unwrap_or("-"),
            %status,
            "alert emitted"
        );
        self.sink.submit(event);
        Ok(EmitOutcome::Emitted { owner_id })
    }
}

pub fn build_event(
    station: &StationConfig,
    cycle_time: DateTime<Utc>,
    status: RunStatus,
    reason: &str,
    source_url: Option<&str>,
) -> AlertEvent {
    AlertEvent {
        station_id: station.station_id.clone(),
        owner_id: station.owner().map(String::from),
        cycle_at: cycle_time,
        status,
        reason: reason.to_string(),
        alerts_enabled: station.alerts_enabled,
        notify_on: station.notify_on,
        cooldown_override_minutes: station.cooldown_minutes,
        source_url: source_url.map(String::from),
    }
}
