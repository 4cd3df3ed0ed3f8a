// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The storage contract shared by every incident store.
//!
//! ## Atomicity
//!
//! Each method is one atomic step. In particular:
//!
//! - `insert_pending` claims the reporter's pending slot, writes the record,
//!   adds it to the active index and appends the creation history entry, or
//!   does none of these
//! - `apply_transition` compares the current status against the expected one
//!   and, only on a match, writes the new status, the field changes, the
//!   history entry, the slot release and the index eviction together
//! - `record_reminder` inserts a `(incident, threshold)` pair at most once,
//!   and only while the incident still has the expected status

use chrono::{DateTime, NaiveDate, Utc};
use incident_desk_domain::{Incident, IncidentId, IncidentStatus, PhotoRef, StatusChange, UserId};

use crate::error::PersistenceError;

/// Result of trying to admit a new incident for a reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotClaim {
    /// The slot was free; the incident is stored.
    Claimed,
    /// The reporter already has an unconfirmed incident; nothing was written.
    Occupied(IncidentId),
}

/// Result of claiming a reminder threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderClaim {
    /// This call recorded the threshold; the reminder may be sent.
    Claimed,
    /// The threshold was recorded earlier.
    AlreadySent,
    /// The incident left the expected status; nothing was written.
    StatusChanged(IncidentStatus),
    /// No record with that id exists.
    Missing,
}

/// Result of a compare-and-set status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The transition was applied; carries the updated record.
    Applied(Incident),
    /// The record exists but its status differs from the expected one.
    StatusMismatch(IncidentStatus),
    /// No record with that id exists.
    Missing,
}

/// Field updates that accompany a status transition.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionChanges {
    pub problem_photo: Option<PhotoRef>,
    pub solution_photo: Option<PhotoRef>,
    pub resolution: Option<String>,
    pub resolver_id: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A guarded status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub incident_id: IncidentId,
    /// Status the record must currently have.
    pub from: IncidentStatus,
    pub to: IncidentStatus,
    pub at: DateTime<Utc>,
    pub actor_id: Option<UserId>,
    pub changes: TransitionChanges,
}

impl Transition {
    #[must_use]
    pub fn new(
        incident_id: IncidentId,
        from: IncidentStatus,
        to: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            incident_id,
            from,
            to,
            at,
            actor_id: None,
            changes: TransitionChanges::default(),
        }
    }

    #[must_use]
    pub fn by(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    #[must_use]
    pub fn with_changes(mut self, changes: TransitionChanges) -> Self {
        self.changes = changes;
        self
    }

    /// Leaving `Created` frees the reporter's pending slot.
    #[must_use]
    pub fn releases_reporter_slot(&self) -> bool {
        self.from == IncidentStatus::Created
    }

    /// Entering a terminal status removes the incident from the active index.
    #[must_use]
    pub const fn leaves_active_index(&self) -> bool {
        self.to.is_terminal()
    }

    /// The history entry this transition appends.
    #[must_use]
    pub fn history_entry(&self) -> StatusChange {
        StatusChange {
            incident_id: self.incident_id.clone(),
            previous_status: Some(self.from),
            new_status: self.to,
            changed_at: self.at,
            actor_id: self.actor_id.clone(),
        }
    }

    /// Applies the status and field changes to an in-memory record.
    pub fn apply_to(&self, incident: &mut Incident) {
        incident.status = self.to;
        if let Some(photo) = &self.changes.problem_photo {
            incident.problem_photo = Some(photo.clone());
            incident.has_problem_photo = true;
        }
        if let Some(photo) = &self.changes.solution_photo {
            incident.solution_photo = Some(photo.clone());
            incident.has_solution_photo = true;
        }
        if let Some(resolution) = &self.changes.resolution {
            incident.resolution = Some(resolution.clone());
        }
        if let Some(resolver_id) = &self.changes.resolver_id {
            incident.resolver_id = Some(resolver_id.clone());
        }
        if let Some(resolved_at) = self.changes.resolved_at {
            incident.resolved_at = Some(resolved_at);
        }
    }
}

/// Durable storage for incidents, their indexes and history.
pub trait IncidentStore: Send + Sync {
    /// Atomically increments and returns the sequence counter for `date`.
    ///
    /// The first call for a date returns 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn next_daily_sequence(&self, date: NaiveDate) -> Result<u32, PersistenceError>;

    /// Stores a freshly created incident if its reporter has no pending one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn insert_pending(&self, incident: &Incident) -> Result<SlotClaim, PersistenceError>;

    /// Returns the reporter's unconfirmed incident, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn pending_for_reporter(&self, reporter_id: &UserId)
    -> Result<Option<IncidentId>, PersistenceError>;

    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the record is corrupt.
    fn get(&self, incident_id: &IncidentId) -> Result<Option<Incident>, PersistenceError>;

    /// Applies `transition` if the stored status equals `transition.from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the record is corrupt.
    fn apply_transition(&self, transition: &Transition) -> Result<CasOutcome, PersistenceError>;

    /// Marks a reminder threshold as sent if the incident's status is still
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn record_reminder(
        &self,
        incident_id: &IncidentId,
        threshold_minutes: u32,
        expected: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<ReminderClaim, PersistenceError>;

    /// Ids in the active index, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn active_ids(&self) -> Result<Vec<IncidentId>, PersistenceError>;

    /// Removes an id from the active index. Returns true if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn evict_active(&self, incident_id: &IncidentId) -> Result<bool, PersistenceError>;

    /// Active, unresolved incidents assigned to `responsible_id`, unordered.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or a record is corrupt.
    fn list_active_for_responsible(
        &self,
        responsible_id: &UserId,
    ) -> Result<Vec<Incident>, PersistenceError>;

    /// Transition history of an incident, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or an entry is corrupt.
    fn history(&self, incident_id: &IncidentId) -> Result<Vec<StatusChange>, PersistenceError>;

    /// Deletes resolved incidents with `resolved_at` before `cutoff`, along
    /// with their reminders and history. Returns the number of incidents
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError>;
}
