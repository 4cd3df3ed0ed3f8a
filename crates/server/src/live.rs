// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Live notification stream.
//!
//! [`LiveEventBroadcaster`] is the process's [`Notifier`]: every dispatch,
//! reminder, overdue and resolution notification is published on a broadcast
//! channel and forwarded to connected WebSocket clients as JSON. Chat bots
//! and dashboards subscribe to `/live` and format messages themselves.
//!
//! Events are informational. Clients that miss events (slow consumers, or no
//! connection at the time) read the current state over HTTP.

use async_trait::async_trait;
use axum::{
    extract::{
        State as AxumState, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use futures::{SinkExt, stream::StreamExt};
use incident_desk::{Notifier, NotifyError, ReminderNotice};
use incident_desk_domain::{
    Branch, Department, Incident, IncidentId, IncidentStatus, Priority, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_BUFFER_SIZE: usize = 100;

/// The incident fields a notification consumer needs to address and word a
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub incident_id: IncidentId,
    pub status: IncidentStatus,
    pub priority: Priority,
    pub branch: Branch,
    pub department: Department,
    pub short_description: String,
    pub reporter_id: UserId,
    pub responsible_id: UserId,
    /// Deadline in the business timezone.
    pub deadline: String,
}

impl IncidentSummary {
    fn new(incident: &Incident, tz: Tz) -> Self {
        Self {
            incident_id: incident.id.clone(),
            status: incident.status,
            priority: incident.priority,
            branch: incident.branch,
            department: incident.department,
            short_description: incident.short_description.clone(),
            reporter_id: incident.reporter_id.clone(),
            responsible_id: incident.responsible_id.clone(),
            deadline: incident
                .deadline
                .with_timezone(&tz)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Problem photo received; the responsible person should act.
    IncidentDispatched { incident: IncidentSummary },
    /// A reminder threshold was crossed.
    DeadlineReminder {
        incident: IncidentSummary,
        threshold_minutes: u32,
        minutes_left: i64,
    },
    IncidentOverdue { incident: IncidentSummary },
    IncidentResolved {
        incident: IncidentSummary,
        resolution: Option<String>,
        resolver_id: Option<UserId>,
    },
    /// Sent once when a client connects.
    Connected {
        /// Server time, RFC 3339.
        timestamp: String,
    },
}

/// Publishes notifications to every live subscriber.
#[derive(Clone)]
pub struct LiveEventBroadcaster {
    tx: broadcast::Sender<LiveEvent>,
    timezone: Tz,
}

impl LiveEventBroadcaster {
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx, timezone }
    }

    /// Publishes `event`. With no subscribers the event is dropped.
    pub fn broadcast(&self, event: &LiveEvent) {
        match self.tx.send(event.clone()) {
            Ok(receivers) => debug!(?event, receivers, "Broadcast live event"),
            Err(_) => debug!(?event, "No receivers for live event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    fn summary(&self, incident: &Incident) -> IncidentSummary {
        IncidentSummary::new(incident, self.timezone)
    }
}

#[async_trait]
impl Notifier for LiveEventBroadcaster {
    async fn notify_dispatched(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.broadcast(&LiveEvent::IncidentDispatched {
            incident: self.summary(incident),
        });
        Ok(())
    }

    async fn notify_reminder(
        &self,
        incident: &Incident,
        notice: ReminderNotice,
    ) -> Result<(), NotifyError> {
        self.broadcast(&LiveEvent::DeadlineReminder {
            incident: self.summary(incident),
            threshold_minutes: notice.threshold_minutes,
            minutes_left: notice.minutes_left,
        });
        Ok(())
    }

    async fn notify_overdue(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.broadcast(&LiveEvent::IncidentOverdue {
            incident: self.summary(incident),
        });
        Ok(())
    }

    async fn notify_resolved(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.broadcast(&LiveEvent::IncidentResolved {
            incident: self.summary(incident),
            resolution: incident.resolution.clone(),
            resolver_id: incident.resolver_id.clone(),
        });
        Ok(())
    }
}

/// Upgrades `/live` requests to a WebSocket event stream.
pub async fn live_events_handler(
    ws: WebSocketUpgrade,
    AxumState(broadcaster): AxumState<Arc<LiveEventBroadcaster>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

async fn handle_socket(socket: WebSocket, broadcaster: Arc<LiveEventBroadcaster>) {
    info!("Client connected to live event stream");

    let (mut sender, mut receiver) = socket.split();
    let mut rx: broadcast::Receiver<LiveEvent> = broadcaster.subscribe();

    let connected: LiveEvent = LiveEvent::Connected {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    if let Ok(json) = serde_json::to_string(&connected)
        && sender.send(Message::Text(json.into())).await.is_err()
    {
        warn!("Failed to send connection confirmation");
        return;
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let event: LiveEvent = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live client lagging, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(?e, "Failed to serialize live event"),
            }
        }
    });

    // The stream is one-way; anything but a close frame is ignored.
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(_) | Message::Binary(_)) => {
                    warn!("Received unexpected message from live client, ignoring");
                }
                Ok(Message::Close(_)) => {
                    debug!("Live client sent close frame");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Err(e) => {
                    error!(?e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Client disconnected from live event stream");
}
