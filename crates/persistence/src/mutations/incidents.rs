// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Incident creation, guarded transitions, reminders and housekeeping.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::SqliteConnection;
use diesel::prelude::*;
use incident_desk_domain::{Incident, IncidentStatus, StatusChange};
use tracing::{debug, info};

use crate::data_models::{
    IncidentChangeset, NewHistoryRow, NewIncidentRow, format_timestamp, threshold_to_column,
};
use crate::diesel_schema::{
    active_incidents, daily_counters, incident_history, incidents, pending_slots, reminders_sent,
};
use crate::error::PersistenceError;
use crate::queries;
use crate::store::{CasOutcome, ReminderClaim, SlotClaim, Transition};

/// Increments the counter for `date` and returns the new value.
///
/// # Errors
///
/// Returns an error if the database upsert fails.
pub fn next_daily_sequence(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<u32, PersistenceError> {
    let business_date: String = date.format("%Y-%m-%d").to_string();

    let value: i32 = diesel::insert_into(daily_counters::table)
        .values((
            daily_counters::business_date.eq(&business_date),
            daily_counters::sequence_value.eq(1),
        ))
        .on_conflict(daily_counters::business_date)
        .do_update()
        .set(daily_counters::sequence_value.eq(daily_counters::sequence_value + 1))
        .returning(daily_counters::sequence_value)
        .get_result(conn)?;

    u32::try_from(value).map_err(|_| {
        PersistenceError::CorruptRecord {
            incident_id: business_date,
            reason: format!("daily counter holds negative value {value}"),
        }
    })
}

/// Stores a new incident unless its reporter already holds a pending one.
///
/// # Errors
///
/// Returns an error if any insert fails; the transaction is rolled back.
pub fn insert_pending(
    conn: &mut SqliteConnection,
    incident: &Incident,
) -> Result<SlotClaim, PersistenceError> {
    conn.immediate_transaction::<_, PersistenceError, _>(|conn| {
        if let Some(existing) = queries::incidents::pending_for_reporter(conn, incident.reporter_id.as_str())? {
            debug!(reporter_id = %incident.reporter_id, pending = %existing, "Pending slot occupied");
            return Ok(SlotClaim::Occupied(existing));
        }

        diesel::insert_into(incidents::table)
            .values(NewIncidentRow::from(incident))
            .execute(conn)?;

        diesel::insert_into(pending_slots::table)
            .values((
                pending_slots::reporter_id.eq(incident.reporter_id.as_str()),
                pending_slots::incident_id.eq(incident.id.as_str()),
            ))
            .execute(conn)?;

        diesel::insert_into(active_incidents::table)
            .values(active_incidents::incident_id.eq(incident.id.as_str()))
            .execute(conn)?;

        let creation: StatusChange = StatusChange {
            incident_id: incident.id.clone(),
            previous_status: None,
            new_status: incident.status,
            changed_at: incident.created_at,
            actor_id: Some(incident.reporter_id.clone()),
        };
        diesel::insert_into(incident_history::table)
            .values(NewHistoryRow::from(&creation))
            .execute(conn)?;

        info!(incident_id = %incident.id, reporter_id = %incident.reporter_id, "Stored new incident");
        Ok(SlotClaim::Claimed)
    })
}

/// Applies a transition if the stored status matches `transition.from`.
///
/// # Errors
///
/// Returns an error if a statement fails; the transaction is rolled back.
pub fn apply_transition(
    conn: &mut SqliteConnection,
    transition: &Transition,
) -> Result<CasOutcome, PersistenceError> {
    let incident_id: &str = transition.incident_id.as_str();

    conn.immediate_transaction::<_, PersistenceError, _>(|conn| {
        let updated: usize = diesel::update(
            incidents::table
                .filter(incidents::incident_id.eq(incident_id))
                .filter(incidents::status.eq(transition.from.as_str())),
        )
        .set(IncidentChangeset::from(transition))
        .execute(conn)?;

        if updated == 0 {
            return Ok(match queries::incidents::find_status(conn, incident_id)? {
                Some(current) => CasOutcome::StatusMismatch(current),
                None => CasOutcome::Missing,
            });
        }

        if transition.releases_reporter_slot() {
            diesel::delete(pending_slots::table.filter(pending_slots::incident_id.eq(incident_id)))
                .execute(conn)?;
        }
        if transition.leaves_active_index() {
            diesel::delete(
                active_incidents::table.filter(active_incidents::incident_id.eq(incident_id)),
            )
            .execute(conn)?;
        }

        let entry: StatusChange = transition.history_entry();
        diesel::insert_into(incident_history::table)
            .values(NewHistoryRow::from(&entry))
            .execute(conn)?;

        let incident: Incident = queries::incidents::find_incident(conn, incident_id)?
            .ok_or_else(|| PersistenceError::IncidentNotFound(transition.incident_id.clone()))?;

        Ok(CasOutcome::Applied(incident))
    })
}

/// Records a reminder threshold while the incident has status `expected`.
///
/// The status check and the insert share one immediate transaction.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn record_reminder(
    conn: &mut SqliteConnection,
    incident_id: &str,
    threshold_minutes: u32,
    expected: IncidentStatus,
    at: DateTime<Utc>,
) -> Result<ReminderClaim, PersistenceError> {
    let threshold: i32 = threshold_to_column(threshold_minutes)?;

    conn.immediate_transaction::<_, PersistenceError, _>(|conn| {
        match queries::incidents::find_status(conn, incident_id)? {
            None => return Ok(ReminderClaim::Missing),
            Some(current) if current != expected => {
                debug!(incident_id, current = %current, threshold_minutes, "Reminder not claimed, status changed");
                return Ok(ReminderClaim::StatusChanged(current));
            }
            Some(_) => {}
        }

        let inserted: usize = diesel::insert_into(reminders_sent::table)
            .values((
                reminders_sent::incident_id.eq(incident_id),
                reminders_sent::threshold_minutes.eq(threshold),
                reminders_sent::sent_at.eq(format_timestamp(at)),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?;

        Ok(if inserted == 1 {
            ReminderClaim::Claimed
        } else {
            ReminderClaim::AlreadySent
        })
    })
}

/// Removes an id from the active index.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn evict_active(conn: &mut SqliteConnection, incident_id: &str) -> Result<bool, PersistenceError> {
    let removed: usize =
        diesel::delete(active_incidents::table.filter(active_incidents::incident_id.eq(incident_id)))
            .execute(conn)?;
    Ok(removed > 0)
}

/// Deletes resolved incidents resolved before `cutoff`.
///
/// Reminder, history, index and slot rows go with them through
/// `ON DELETE CASCADE`.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn purge_resolved_before(
    conn: &mut SqliteConnection,
    cutoff: DateTime<Utc>,
) -> Result<usize, PersistenceError> {
    let removed: usize = diesel::delete(
        incidents::table
            .filter(incidents::status.eq(IncidentStatus::Resolved.as_str()))
            .filter(incidents::resolved_at.lt(format_timestamp(cutoff))),
    )
    .execute(conn)?;

    if removed > 0 {
        info!(removed, cutoff = %cutoff, "Purged resolved incidents past retention");
    }
    Ok(removed)
}
