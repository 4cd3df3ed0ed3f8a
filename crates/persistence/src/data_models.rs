// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Row types for the incident tables and their conversion to domain types.
//!
//! Enumerations are stored by their `as_str` names and timestamps as UTC
//! RFC 3339 strings with millisecond precision. Anything that fails to decode
//! is reported as `PersistenceError::CorruptRecord`.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use incident_desk_domain::{
    Branch, Department, Incident, IncidentId, IncidentStatus, PhotoRef, Priority, StatusChange,
    UserId,
};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::diesel_schema::{incident_history, incidents};
use crate::error::PersistenceError;
use crate::store::Transition;

/// Formats a timestamp for storage.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn corrupt(incident_id: &str, field: &str, err: impl Display) -> PersistenceError {
    PersistenceError::CorruptRecord {
        incident_id: incident_id.to_string(),
        reason: format!("{field}: {err}"),
    }
}

fn parse_timestamp(
    incident_id: &str,
    field: &str,
    value: &str,
) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| corrupt(incident_id, field, e))
}

fn parse_field<T>(incident_id: &str, field: &str, value: &str) -> Result<T, PersistenceError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| corrupt(incident_id, field, e))
}

fn parse_user(incident_id: &str, field: &str, value: &str) -> Result<UserId, PersistenceError> {
    UserId::new(value).map_err(|e| corrupt(incident_id, field, e))
}

fn parse_photo(incident_id: &str, field: &str, value: &str) -> Result<PhotoRef, PersistenceError> {
    PhotoRef::new(value).map_err(|e| corrupt(incident_id, field, e))
}

/// Converts a reminder threshold column value.
///
/// # Errors
///
/// Returns `CorruptRecord` for negative values.
pub fn threshold_from_column(incident_id: &str, value: i32) -> Result<u32, PersistenceError> {
    u32::try_from(value).map_err(|e| corrupt(incident_id, "threshold_minutes", e))
}

/// Converts a reminder threshold for storage.
///
/// # Errors
///
/// Returns an error if the threshold does not fit the column.
pub fn threshold_to_column(threshold_minutes: u32) -> Result<i32, PersistenceError> {
    i32::try_from(threshold_minutes).map_err(|_| {
        PersistenceError::QueryFailed(format!(
            "reminder threshold {threshold_minutes} exceeds column range"
        ))
    })
}

/// Diesel Queryable struct for incident rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = incidents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IncidentRow {
    pub incident_id: String,
    pub reporter_id: String,
    pub branch: String,
    pub department: String,
    pub priority: String,
    pub short_description: String,
    pub full_message: String,
    pub status: String,
    pub deadline: String,
    pub responsible_id: String,
    pub problem_photo: Option<String>,
    pub solution_photo: Option<String>,
    pub resolution: Option<String>,
    pub resolver_id: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl IncidentRow {
    /// Decodes the row, attaching the reminder thresholds already sent.
    ///
    /// # Errors
    ///
    /// Returns `CorruptRecord` if any column fails to decode.
    pub fn into_incident(self, reminders_sent: BTreeSet<u32>) -> Result<Incident, PersistenceError> {
        let key: &str = &self.incident_id;

        let problem_photo: Option<PhotoRef> = self
            .problem_photo
            .as_deref()
            .map(|value| parse_photo(key, "problem_photo", value))
            .transpose()?;
        let solution_photo: Option<PhotoRef> = self
            .solution_photo
            .as_deref()
            .map(|value| parse_photo(key, "solution_photo", value))
            .transpose()?;

        Ok(Incident {
            id: IncidentId::parse(key).map_err(|e| corrupt(key, "incident_id", e))?,
            reporter_id: parse_user(key, "reporter_id", &self.reporter_id)?,
            branch: parse_field::<Branch>(key, "branch", &self.branch)?,
            department: parse_field::<Department>(key, "department", &self.department)?,
            priority: parse_field::<Priority>(key, "priority", &self.priority)?,
            short_description: self.short_description,
            full_message: self.full_message,
            status: parse_field::<IncidentStatus>(key, "status", &self.status)?,
            deadline: parse_timestamp(key, "deadline", &self.deadline)?,
            responsible_id: parse_user(key, "responsible_id", &self.responsible_id)?,
            has_problem_photo: problem_photo.is_some(),
            has_solution_photo: solution_photo.is_some(),
            problem_photo,
            solution_photo,
            reminders_sent,
            resolution: self.resolution,
            resolver_id: self
                .resolver_id
                .as_deref()
                .map(|value| parse_user(key, "resolver_id", value))
                .transpose()?,
            created_at: parse_timestamp(key, "created_at", &self.created_at)?,
            resolved_at: self
                .resolved_at
                .as_deref()
                .map(|value| parse_timestamp(key, "resolved_at", value))
                .transpose()?,
        })
    }
}

/// Insertable form of a freshly created incident.
#[derive(Insertable)]
#[diesel(table_name = incidents)]
pub struct NewIncidentRow<'a> {
    pub incident_id: &'a str,
    pub reporter_id: &'a str,
    pub branch: &'a str,
    pub department: &'a str,
    pub priority: &'a str,
    pub short_description: &'a str,
    pub full_message: &'a str,
    pub status: &'a str,
    pub deadline: String,
    pub responsible_id: &'a str,
    pub problem_photo: Option<&'a str>,
    pub solution_photo: Option<&'a str>,
    pub resolution: Option<&'a str>,
    pub resolver_id: Option<&'a str>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl<'a> From<&'a Incident> for NewIncidentRow<'a> {
    fn from(incident: &'a Incident) -> Self {
        Self {
            incident_id: incident.id.as_str(),
            reporter_id: incident.reporter_id.as_str(),
            branch: incident.branch.as_str(),
            department: incident.department.as_str(),
            priority: incident.priority.as_str(),
            short_description: &incident.short_description,
            full_message: &incident.full_message,
            status: incident.status.as_str(),
            deadline: format_timestamp(incident.deadline),
            responsible_id: incident.responsible_id.as_str(),
            problem_photo: incident.problem_photo.as_ref().map(PhotoRef::as_str),
            solution_photo: incident.solution_photo.as_ref().map(PhotoRef::as_str),
            resolution: incident.resolution.as_deref(),
            resolver_id: incident.resolver_id.as_ref().map(UserId::as_str),
            created_at: format_timestamp(incident.created_at),
            resolved_at: incident.resolved_at.map(format_timestamp),
        }
    }
}

/// Columns written by a status transition. `None` fields are left untouched.
#[derive(AsChangeset)]
#[diesel(table_name = incidents)]
pub struct IncidentChangeset<'a> {
    pub status: &'a str,
    pub problem_photo: Option<&'a str>,
    pub solution_photo: Option<&'a str>,
    pub resolution: Option<&'a str>,
    pub resolver_id: Option<&'a str>,
    pub resolved_at: Option<String>,
}

impl<'a> From<&'a Transition> for IncidentChangeset<'a> {
    fn from(transition: &'a Transition) -> Self {
        let changes = &transition.changes;
        Self {
            status: transition.to.as_str(),
            problem_photo: changes.problem_photo.as_ref().map(PhotoRef::as_str),
            solution_photo: changes.solution_photo.as_ref().map(PhotoRef::as_str),
            resolution: changes.resolution.as_deref(),
            resolver_id: changes.resolver_id.as_ref().map(UserId::as_str),
            resolved_at: changes.resolved_at.map(format_timestamp),
        }
    }
}

/// Diesel Queryable struct for history rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = incident_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HistoryRow {
    pub incident_id: String,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_at: String,
    pub actor_id: Option<String>,
}

impl TryFrom<HistoryRow> for StatusChange {
    type Error = PersistenceError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let key: &str = &row.incident_id;
        Ok(Self {
            incident_id: IncidentId::parse(key).map_err(|e| corrupt(key, "incident_id", e))?,
            previous_status: row
                .previous_status
                .as_deref()
                .map(|value| parse_field::<IncidentStatus>(key, "previous_status", value))
                .transpose()?,
            new_status: parse_field::<IncidentStatus>(key, "new_status", &row.new_status)?,
            changed_at: parse_timestamp(key, "changed_at", &row.changed_at)?,
            actor_id: row
                .actor_id
                .as_deref()
                .map(|value| parse_user(key, "actor_id", value))
                .transpose()?,
        })
    }
}

/// Insertable form of a history entry.
#[derive(Insertable)]
#[diesel(table_name = incident_history)]
pub struct NewHistoryRow<'a> {
    pub incident_id: &'a str,
    pub previous_status: Option<&'a str>,
    pub new_status: &'a str,
    pub changed_at: String,
    pub actor_id: Option<&'a str>,
}

impl<'a> From<&'a StatusChange> for NewHistoryRow<'a> {
    fn from(entry: &'a StatusChange) -> Self {
        Self {
            incident_id: entry.incident_id.as_str(),
            previous_status: entry.previous_status.as_ref().map(IncidentStatus::as_str),
            new_status: entry.new_status.as_str(),
            changed_at: format_timestamp(entry.changed_at),
            actor_id: entry.actor_id.as_ref().map(UserId::as_str),
        }
    }
}
