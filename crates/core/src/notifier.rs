// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Notification egress.
//!
//! Notifications are best-effort. A failed or slow notification never undoes
//! the transition that triggered it; [`NotificationDispatcher`] bounds each
//! call with a timeout, logs failures and counts them.

use async_trait::async_trait;
use incident_desk_domain::{Incident, IncidentId};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification rejected by recipient: {0}")]
    Rejected(String),
}

/// Payload of a deadline reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderNotice {
    /// The threshold that triggered the reminder.
    pub threshold_minutes: u32,
    /// Whole minutes left until the deadline when the reminder fired.
    pub minutes_left: i64,
}

/// Receives incident notifications. Implementations format and deliver them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The incident was confirmed and handed to its responsible person.
    async fn notify_dispatched(&self, incident: &Incident) -> Result<(), NotifyError>;

    async fn notify_reminder(
        &self,
        incident: &Incident,
        notice: ReminderNotice,
    ) -> Result<(), NotifyError>;

    async fn notify_overdue(&self, incident: &Incident) -> Result<(), NotifyError>;

    async fn notify_resolved(&self, incident: &Incident) -> Result<(), NotifyError>;
}

/// Wraps a [`Notifier`] with a timeout and failure accounting.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    failures: AtomicU64,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("timeout", &self.timeout)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            notifier,
            timeout,
            failures: AtomicU64::new(0),
        }
    }

    /// Number of notifications that failed or timed out so far.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub async fn dispatched(&self, incident: &Incident) -> bool {
        self.deliver("dispatched", &incident.id, self.notifier.notify_dispatched(incident))
            .await
    }

    pub async fn reminder(&self, incident: &Incident, notice: ReminderNotice) -> bool {
        self.deliver(
            "reminder",
            &incident.id,
            self.notifier.notify_reminder(incident, notice),
        )
        .await
    }

    pub async fn overdue(&self, incident: &Incident) -> bool {
        self.deliver("overdue", &incident.id, self.notifier.notify_overdue(incident))
            .await
    }

    pub async fn resolved(&self, incident: &Incident) -> bool {
        self.deliver("resolved", &incident.id, self.notifier.notify_resolved(incident))
            .await
    }

    async fn deliver<F>(&self, kind: &'static str, incident_id: &IncidentId, call: F) -> bool
    where
        F: Future<Output = Result<(), NotifyError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => {
                debug!(incident_id = %incident_id, kind, "Notification delivered");
                true
            }
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(incident_id = %incident_id, kind, error = %e, "Notification failed");
                false
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    incident_id = %incident_id,
                    kind,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Notification timed out"
                );
                false
            }
        }
    }
}
