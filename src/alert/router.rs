//! Cooldown router.
//!
//! Consumes alert events and decides, per (station, owner) pair, whether to
//! dispatch or suppress. A pair is *hot* while less than a cooldown window
//! has passed since its last actual dispatch; suppressed events never move
//! that anchor. A station recovering to `ok` does not cool the pair.
//!
//! The router resolves the owner's channel but never re-reads the station:
//! the owner and station policy embedded on the event are authoritative.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use chrono::{DateTime, Duration, Utc};

use crate::alert::channel::{AlertMessage, NotificationChannel};
use crate::alert::cooldown::{Claim, CooldownKey, CooldownStore};
use crate::alert::emitter::AlertSink;
use crate::config::MonitorConfig;
use crate::logging::Component;
use crate::model::{AlertEvent, ChannelRef, MonitorError, RunStatus};
use crate::stations::Registry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// `ok` events are never routed.
    NotAlertable,
    StationAlertsDisabled,
    /// The station's `notify_on` does not cover this status.
    NotifyPolicy,
    OwnerNotFound,
    OwnerAlertsDisabled,
    /// No channel: owner without one, or owner-less with no default channel.
    Unrouted,
    Cooldown { last_alert_sent_at: DateTime<Utc> },
    /// This (station, cycle) was already dispatched to the pair.
    DuplicateCycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched { channel: ChannelRef },
    Suppressed(SuppressReason),
    /// The channel failed. `window_spent` tells whether the pair stays hot.
    Failed { channel: ChannelRef, reason: String, window_spent: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterPolicy {
    pub cooldown_window: Duration,
    pub default_channel: Option<ChannelRef>,
    pub spend_cooldown_on_dispatch_failure: bool,
}

impl RouterPolicy {
    pub fn from_config(config: &MonitorConfig) -> Self {
        RouterPolicy {
            cooldown_window: config.cooldown_window(),
            default_channel: config.default_channel.clone().map(ChannelRef),
            spend_cooldown_on_dispatch_failure: config.spend_cooldown_on_dispatch_failure,
        }
    }
}

/// Routing result for one event, as reported in the cycle summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedAlert {
    pub station_id: String,
    pub owner_id: Option<String>,
    pub status: RunStatus,
    pub outcome: Result<RouteOutcome, MonitorError>,
}

/// Source of the dispatch time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct CooldownRouter {
    registry: Arc<dyn Registry>,
    cooldowns: Arc<dyn CooldownStore>,
    channel: Arc<dyn NotificationChannel>,
    policy: RouterPolicy,
    clock: Clock,
}

impl CooldownRouter {
    pub fn new(
        registry: Arc<dyn Registry>,
        cooldowns: Arc<dyn CooldownStore>,
        channel: Arc<dyn NotificationChannel>,
        policy: RouterPolicy,
    ) -> Self {
        CooldownRouter {
            registry,
            cooldowns,
            channel,
            policy,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn route(&self, event: &AlertEvent) -> Result<RouteOutcome, MonitorError> {
        self.route_at(event, (self.clock)())
    }

    /// Route with an explicit clock; `now` is what gets recorded as the
    /// dispatch time.
    pub fn route_at(&self, event: &AlertEvent, now: DateTime<Utc>) -> Result<RouteOutcome, MonitorError> {
        if let Some(reason) = policy_gate(event) {
            return Ok(self.suppressed(event, reason));
        }

        let channel = match self.resolve_channel(event)? {
            Ok(channel) => channel,
            Err(reason) => return Ok(self.suppressed(event, reason)),
        };

        let key = CooldownKey::new(&event.station_id, event.owner_id.as_deref());
        let window = event.cooldown_override().unwrap_or(self.policy.cooldown_window);
        let (claimed, previous) = match self.cooldowns.try_claim(&key, event.cycle_at, now, window)? {
            Claim::Granted { claimed, previous } => (claimed, previous),
            Claim::Hot { last_alert_sent_at } => {
                return Ok(self.suppressed(event, SuppressReason::Cooldown { last_alert_sent_at }));
            }
            Claim::Duplicate => return Ok(self.suppressed(event, SuppressReason::DuplicateCycle)),
        };

        let message = AlertMessage::for_event(event);
        match self.channel.send(&channel, &message) {
            Ok(()) => {
                tracing::info!(
                    component = %Component::Router,
                    station_id = %event.station_id,
                    owner_id = event.owner_id.as_deref().unwrap_or("-"),
                    status = %event.status,
                    %channel,
                    "alert dispatched"
                );
                Ok(RouteOutcome::Dispatched { channel })
            }
            Err(err) => {
                let window_spent = self.policy.spend_cooldown_on_dispatch_failure;
                if !window_spent {
                    self.cooldowns.release(&key, &claimed, previous)?;
                }
                tracing::error!(
                    component = %Component::Router,
                    station_id = %event.station_id,
                    owner_id = event.owner_id.as_deref().unwrap_or("-"),
                    %channel,
                    window_spent,
                    "alert dispatch failed: {}",
                    err
                );
                Ok(RouteOutcome::Failed {
                    channel,
                    reason: err.to_string(),
                    window_spent,
                })
            }
        }
    }

    /// Drain a queue until every sender is gone, routing each event in
    /// arrival order.
    pub fn drain(&self, events: Receiver<AlertEvent>) -> Vec<RoutedAlert> {
        events
            .into_iter()
            .map(|event| {
                let outcome = self.route(&event);
                if let Err(err) = &outcome {
                    tracing::error!(
                        component = %Component::Router,
                        station_id = %event.station_id,
                        "alert routing failed: {}",
                        err
                    );
                }
                RoutedAlert {
                    station_id: event.station_id,
                    owner_id: event.owner_id,
                    status: event.status,
                    outcome,
                }
            })
            .collect()
    }

    /// Outer `Err` is a registry failure; inner `Err` is a suppression.
    fn resolve_channel(&self, event: &AlertEvent) -> Result<Result<ChannelRef, SuppressReason>, MonitorError> {
        let Some(owner_id) = event.owner_id.as_deref() else {
            return Ok(self.policy.default_channel.clone().ok_or(SuppressReason::Unrouted));
        };
        let Some(owner) = self.registry.get_owner(owner_id)? else {
            return Ok(Err(SuppressReason::OwnerNotFound));
        };
        if !owner.alerts_enabled {
            return Ok(Err(SuppressReason::OwnerAlertsDisabled));
        }
        Ok(owner.channel.ok_or(SuppressReason::Unrouted))
    }

    fn suppressed(&self, event: &AlertEvent, reason: SuppressReason) -> RouteOutcome {
        tracing::debug!(
            component = %Component::Router,
            station_id = %event.station_id,
            owner_id = event.owner_id.as_deref().unwrap_or("-"),
            status = %event.status,
            ?reason,
            "alert suppressed"
        );
        RouteOutcome::Suppressed(reason)
    }
}

/// Routing inline, for callers that do not need a queue.
impl AlertSink for CooldownRouter {
    fn submit(&self, event: AlertEvent) {
        if let Err(err) = self.route(&event) {
            tracing::error!(
                component = %Component::Router,
                station_id = %event.station_id,
                "alert routing failed: {}",
                err
            );
        }
    }
}

fn policy_gate(event: &AlertEvent) -> Option<SuppressReason> {
    if !event.status.is_bad() {
        Some(SuppressReason::NotAlertable)
    } else if !event.alerts_enabled {
        Some(SuppressReason::StationAlertsDisabled)
    } else if !event.notify_on.covers(event.status) {
        Some(SuppressReason::NotifyPolicy)
    } else {
        None
    }
}
