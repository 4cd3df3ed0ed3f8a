// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Incident, index and history queries.

use diesel::SqliteConnection;
use diesel::prelude::*;
use incident_desk_domain::{Incident, IncidentId, IncidentStatus, StatusChange};
use std::collections::BTreeSet;
use tracing::debug;

use crate::data_models::{HistoryRow, IncidentRow, threshold_from_column};
use crate::diesel_schema::{
    active_incidents, incident_history, incidents, pending_slots, reminders_sent,
};
use crate::error::PersistenceError;

/// Decodes an id read from an index table.
///
/// # Errors
///
/// Returns `CorruptRecord` if the value is not a valid incident id.
pub fn decode_id(value: &str) -> Result<IncidentId, PersistenceError> {
    IncidentId::parse(value).map_err(|e| PersistenceError::CorruptRecord {
        incident_id: value.to_string(),
        reason: e.to_string(),
    })
}

/// Reminder thresholds already sent for an incident.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn reminders_for(
    conn: &mut SqliteConnection,
    incident_id: &str,
) -> Result<BTreeSet<u32>, PersistenceError> {
    let values: Vec<i32> = reminders_sent::table
        .filter(reminders_sent::incident_id.eq(incident_id))
        .select(reminders_sent::threshold_minutes)
        .load(conn)?;

    values
        .into_iter()
        .map(|value| threshold_from_column(incident_id, value))
        .collect()
}

/// Retrieves an incident with its reminder set.
///
/// # Errors
///
/// Returns an error if the database query fails or the row is corrupt.
/// Returns `Ok(None)` if the incident is not found.
pub fn find_incident(
    conn: &mut SqliteConnection,
    incident_id: &str,
) -> Result<Option<Incident>, PersistenceError> {
    let row: Option<IncidentRow> = incidents::table
        .filter(incidents::incident_id.eq(incident_id))
        .select(IncidentRow::as_select())
        .first(conn)
        .optional()?;

    match row {
        Some(row) => {
            let reminders: BTreeSet<u32> = reminders_for(conn, incident_id)?;
            row.into_incident(reminders).map(Some)
        }
        None => {
            debug!(incident_id, "Incident not found");
            Ok(None)
        }
    }
}

/// Retrieves only the status column of an incident.
///
/// # Errors
///
/// Returns an error if the database query fails or the status is corrupt.
pub fn find_status(
    conn: &mut SqliteConnection,
    incident_id: &str,
) -> Result<Option<IncidentStatus>, PersistenceError> {
    let status: Option<String> = incidents::table
        .filter(incidents::incident_id.eq(incident_id))
        .select(incidents::status)
        .first(conn)
        .optional()?;

    status
        .map(|value| {
            value
                .parse::<IncidentStatus>()
                .map_err(|e| PersistenceError::CorruptRecord {
                    incident_id: incident_id.to_string(),
                    reason: format!("status: {e}"),
                })
        })
        .transpose()
}

/// The unconfirmed incident held by a reporter, if any.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn pending_for_reporter(
    conn: &mut SqliteConnection,
    reporter_id: &str,
) -> Result<Option<IncidentId>, PersistenceError> {
    let pending: Option<String> = pending_slots::table
        .filter(pending_slots::reporter_id.eq(reporter_id))
        .select(pending_slots::incident_id)
        .first(conn)
        .optional()?;

    pending.as_deref().map(decode_id).transpose()
}

/// All ids in the active index, in id order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn active_ids(conn: &mut SqliteConnection) -> Result<Vec<IncidentId>, PersistenceError> {
    let ids: Vec<String> = active_incidents::table
        .select(active_incidents::incident_id)
        .order(active_incidents::incident_id.asc())
        .load(conn)?;

    ids.iter().map(String::as_str).map(decode_id).collect()
}

/// Active, unresolved incidents assigned to a responsible person.
///
/// # Errors
///
/// Returns an error if the database query fails or a row is corrupt.
pub fn active_for_responsible(
    conn: &mut SqliteConnection,
    responsible_id: &str,
) -> Result<Vec<Incident>, PersistenceError> {
    let rows: Vec<IncidentRow> = incidents::table
        .inner_join(active_incidents::table)
        .filter(incidents::responsible_id.eq(responsible_id))
        .filter(incidents::status.ne(IncidentStatus::Resolved.as_str()))
        .select(IncidentRow::as_select())
        .load(conn)?;

    rows.into_iter()
        .map(|row| {
            let reminders: BTreeSet<u32> = reminders_for(conn, &row.incident_id)?;
            row.into_incident(reminders)
        })
        .collect()
}

/// History entries of an incident in insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails or an entry is corrupt.
pub fn history(
    conn: &mut SqliteConnection,
    incident_id: &str,
) -> Result<Vec<StatusChange>, PersistenceError> {
    let rows: Vec<HistoryRow> = incident_history::table
        .filter(incident_history::incident_id.eq(incident_id))
        .order(incident_history::history_id.asc())
        .select(HistoryRow::as_select())
        .load(conn)?;

    rows.into_iter().map(StatusChange::try_from).collect()
}
