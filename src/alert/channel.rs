//! Notification channels and alert message formatting.
//!
//! Channels are black boxes to the router: one `send` per dispatched alert,
//! success or a `Dispatch` error. Retries and backoff are the channel's
//! business.

use std::time::Duration;

use serde::Serialize;

use crate::model::{AlertEvent, ChannelRef, MonitorError};

/// Subject lines are cut to this many characters; some providers reject
/// anything longer.
pub const MAX_SUBJECT_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub station_id: String,
    pub owner_id: String,
    pub status: String,
}

impl AlertMessage {
    pub fn for_event(event: &AlertEvent) -> Self {
        let mut subject = format!("METAR {} - {}", event.status.as_str().to_uppercase(), event.station_id);
        if subject.chars().count() > MAX_SUBJECT_LEN {
            subject = subject.chars().take(MAX_SUBJECT_LEN).collect();
        }
        let owner_id = event.owner_id.clone().unwrap_or_default();
        let reason = if event.reason.trim().is_empty() { "N/A" } else { event.reason.as_str() };
        let body = format!(
            "Station: {}\nStatus: {}\nChecked At UTC: {}\nOwner: {}\nReason: {}\nSource URL: {}\n",
            event.station_id,
            event.status,
            event.cycle_at.to_rfc3339(),
            if owner_id.is_empty() { "(none)" } else { owner_id.as_str() },
            reason,
            event.source_url.as_deref().unwrap_or("N/A"),
        );
        AlertMessage {
            subject,
            body,
            station_id: event.station_id.clone(),
            owner_id,
            status: event.status.to_string(),
        }
    }
}

pub trait NotificationChannel: Send + Sync {
    fn send(&self, channel: &ChannelRef, message: &AlertMessage) -> Result<(), MonitorError>;
}

/// Posts the message as JSON to the channel URL.
pub struct WebhookChannel {
    client: reqwest::blocking::Client,
}

impl WebhookChannel {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(WebhookChannel { client })
    }
}

impl NotificationChannel for WebhookChannel {
    fn send(&self, channel: &ChannelRef, message: &AlertMessage) -> Result<(), MonitorError> {
        let response = self
            .client
            .post(channel.0.as_str())
            .json(message)
            .send()
            .map_err(|e| MonitorError::Dispatch(format!("request to {} failed: {}", channel, e)))?;
        if !response.status().is_success() {
            return Err(MonitorError::Dispatch(format!(
                "{} answered HTTP {}",
                channel,
                response.status()
            )));
        }
        Ok(())
    }
}
