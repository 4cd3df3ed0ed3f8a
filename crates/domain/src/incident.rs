// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The incident record and its read-only projections.

use crate::error::DomainError;
use crate::status::IncidentStatus;
use crate::types::{Branch, Department, IncidentId, PhotoRef, Priority, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structured intake handed over by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub reporter_id: UserId,
    pub branch: Branch,
    pub department: Department,
    pub priority: Priority,
    pub short_description: String,
    pub full_message: String,
}

impl NewIncident {
    /// Checks that the free-text fields carry content.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyText` naming the first blank field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.short_description.trim().is_empty() {
            return Err(DomainError::EmptyText {
                field: "short_description",
            });
        }
        if self.full_message.trim().is_empty() {
            return Err(DomainError::EmptyText {
                field: "full_message",
            });
        }
        Ok(())
    }
}

/// A reported operational problem tracked through resolution.
///
/// Identity, classification, text, deadline and responsible person are fixed
/// at creation. Everything else changes only through status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub id: IncidentId,
    pub reporter_id: UserId,
    pub branch: Branch,
    pub department: Department,
    pub priority: Priority,
    pub short_description: String,
    pub full_message: String,
    pub status: IncidentStatus,
    pub deadline: DateTime<Utc>,
    pub responsible_id: UserId,
    pub has_problem_photo: bool,
    pub has_solution_photo: bool,
    pub problem_photo: Option<PhotoRef>,
    pub solution_photo: Option<PhotoRef>,
    /// Reminder thresholds (minutes before deadline) already delivered.
    pub reminders_sent: BTreeSet<u32>,
    pub resolution: Option<String>,
    pub resolver_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// Builds a freshly reported incident in `Created` status.
    #[must_use]
    pub fn created(
        id: IncidentId,
        intake: NewIncident,
        deadline: DateTime<Utc>,
        responsible_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reporter_id: intake.reporter_id,
            branch: intake.branch,
            department: intake.department,
            priority: intake.priority,
            short_description: intake.short_description,
            full_message: intake.full_message,
            status: IncidentStatus::Created,
            deadline,
            responsible_id,
            has_problem_photo: false,
            has_solution_photo: false,
            problem_photo: None,
            solution_photo: None,
            reminders_sent: BTreeSet::new(),
            resolution: None,
            resolver_id: None,
            created_at,
            resolved_at: None,
        }
    }

    /// Time remaining until the deadline; negative once it has passed.
    #[must_use]
    pub fn time_left(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.deadline - now
    }
}

/// One entry of an incident's transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub incident_id: IncidentId,
    /// `None` for the creation entry.
    pub previous_status: Option<IncidentStatus>,
    pub new_status: IncidentStatus,
    pub changed_at: DateTime<Utc>,
    /// The user who caused the change, when it was user-initiated.
    pub actor_id: Option<UserId>,
}

/// Read-only projection of an incident for status queries.
///
/// Timestamps are rendered in the business timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentView {
    pub id: IncidentId,
    pub reporter_id: UserId,
    pub branch: Branch,
    pub department: Department,
    pub priority: Priority,
    pub status: IncidentStatus,
    pub short_description: String,
    pub full_message: String,
    pub responsible_id: UserId,
    pub deadline: String,
    pub minutes_left: i64,
    pub is_past_deadline: bool,
    pub has_problem_photo: bool,
    pub has_solution_photo: bool,
    pub reminders_sent: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver_id: Option<UserId>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl IncidentView {
    /// Projects an incident as seen at `now` from the business timezone.
    #[must_use]
    pub fn project(incident: &Incident, now: DateTime<Utc>, tz: Tz) -> Self {
        let render = |instant: DateTime<Utc>| {
            instant
                .with_timezone(&tz)
                .to_rfc3339_opts(SecondsFormat::Secs, false)
        };
        let time_left: chrono::Duration = incident.time_left(now);

        Self {
            id: incident.id.clone(),
            reporter_id: incident.reporter_id.clone(),
            branch: incident.branch,
            department: incident.department,
            priority: incident.priority,
            status: incident.status,
            short_description: incident.short_description.clone(),
            full_message: incident.full_message.clone(),
            responsible_id: incident.responsible_id.clone(),
            deadline: render(incident.deadline),
            minutes_left: time_left.num_minutes(),
            is_past_deadline: time_left <= chrono::Duration::zero(),
            has_problem_photo: incident.has_problem_photo,
            has_solution_photo: incident.has_solution_photo,
            reminders_sent: incident.reminders_sent.iter().copied().collect(),
            resolution: incident.resolution.clone(),
            resolver_id: incident.resolver_id.clone(),
            created_at: render(incident.created_at),
            resolved_at: incident.resolved_at.map(render),
        }
    }
}
