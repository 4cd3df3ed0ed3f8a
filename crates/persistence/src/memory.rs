// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A process-local incident store.
//!
//! All state sits behind one `RwLock`, so every trait method is atomic with
//! respect to every other. Availability can be switched off to exercise the
//! callers' store-unavailable paths.

use chrono::{DateTime, NaiveDate, Utc};
use incident_desk_domain::{Incident, IncidentId, IncidentStatus, StatusChange, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::PersistenceError;
use crate::store::{CasOutcome, IncidentStore, ReminderClaim, SlotClaim, Transition};

#[derive(Debug, Default)]
struct MemoryState {
    incidents: HashMap<IncidentId, Incident>,
    history: Vec<StatusChange>,
    active: BTreeSet<IncidentId>,
    pending: HashMap<UserId, IncidentId>,
    counters: HashMap<NaiveDate, u32>,
}

/// In-memory [`IncidentStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every subsequent operation fail with `PersistenceError::Unavailable`
    /// until availability is restored.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, PersistenceError> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|_| PersistenceError::Other(String::from("in-memory store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, PersistenceError> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|_| PersistenceError::Other(String::from("in-memory store lock poisoned")))
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable(String::from(
                "in-memory store switched off",
            )))
        }
    }
}

impl IncidentStore for InMemoryStore {
    fn next_daily_sequence(&self, date: NaiveDate) -> Result<u32, PersistenceError> {
        let mut state = self.write()?;
        let counter: &mut u32 = state.counters.entry(date).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn insert_pending(&self, incident: &Incident) -> Result<SlotClaim, PersistenceError> {
        let mut state = self.write()?;

        if let Some(existing) = state.pending.get(&incident.reporter_id) {
            debug!(reporter_id = %incident.reporter_id, pending = %existing, "Pending slot occupied");
            return Ok(SlotClaim::Occupied(existing.clone()));
        }
        if state.incidents.contains_key(&incident.id) {
            return Err(PersistenceError::ConstraintViolation(format!(
                "incident {} already exists",
                incident.id
            )));
        }

        state
            .pending
            .insert(incident.reporter_id.clone(), incident.id.clone());
        state.active.insert(incident.id.clone());
        state.history.push(StatusChange {
            incident_id: incident.id.clone(),
            previous_status: None,
            new_status: incident.status,
            changed_at: incident.created_at,
            actor_id: Some(incident.reporter_id.clone()),
        });
        state.incidents.insert(incident.id.clone(), incident.clone());

        Ok(SlotClaim::Claimed)
    }

    fn pending_for_reporter(
        &self,
        reporter_id: &UserId,
    ) -> Result<Option<IncidentId>, PersistenceError> {
        Ok(self.read()?.pending.get(reporter_id).cloned())
    }

    fn get(&self, incident_id: &IncidentId) -> Result<Option<Incident>, PersistenceError> {
        Ok(self.read()?.incidents.get(incident_id).cloned())
    }

    fn apply_transition(&self, transition: &Transition) -> Result<CasOutcome, PersistenceError> {
        let mut state = self.write()?;

        let Some(incident) = state.incidents.get_mut(&transition.incident_id) else {
            return Ok(CasOutcome::Missing);
        };
        if incident.status != transition.from {
            return Ok(CasOutcome::StatusMismatch(incident.status));
        }

        transition.apply_to(incident);
        let updated: Incident = incident.clone();

        if transition.releases_reporter_slot()
            && state.pending.get(&updated.reporter_id) == Some(&updated.id)
        {
            state.pending.remove(&updated.reporter_id);
        }
        if transition.leaves_active_index() {
            state.active.remove(&updated.id);
        }
        state.history.push(transition.history_entry());

        Ok(CasOutcome::Applied(updated))
    }

    fn record_reminder(
        &self,
        incident_id: &IncidentId,
        threshold_minutes: u32,
        expected: IncidentStatus,
        _at: DateTime<Utc>,
    ) -> Result<ReminderClaim, PersistenceError> {
        let mut state = self.write()?;
        let Some(incident) = state.incidents.get_mut(incident_id) else {
            return Ok(ReminderClaim::Missing);
        };
        if incident.status != expected {
            return Ok(ReminderClaim::StatusChanged(incident.status));
        }
        Ok(if incident.reminders_sent.insert(threshold_minutes) {
            ReminderClaim::Claimed
        } else {
            ReminderClaim::AlreadySent
        })
    }

    fn active_ids(&self) -> Result<Vec<IncidentId>, PersistenceError> {
        Ok(self.read()?.active.iter().cloned().collect())
    }

    fn evict_active(&self, incident_id: &IncidentId) -> Result<bool, PersistenceError> {
        Ok(self.write()?.active.remove(incident_id))
    }

    fn list_active_for_responsible(
        &self,
        responsible_id: &UserId,
    ) -> Result<Vec<Incident>, PersistenceError> {
        let state = self.read()?;
        Ok(state
            .active
            .iter()
            .filter_map(|id| state.incidents.get(id))
            .filter(|incident| {
                &incident.responsible_id == responsible_id
                    && incident.status != IncidentStatus::Resolved
            })
            .cloned()
            .collect())
    }

    fn history(&self, incident_id: &IncidentId) -> Result<Vec<StatusChange>, PersistenceError> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|entry| &entry.incident_id == incident_id)
            .cloned()
            .collect())
    }

    fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut state = self.write()?;

        let expired: Vec<IncidentId> = state
            .incidents
            .values()
            .filter(|incident| {
                incident.status == IncidentStatus::Resolved
                    && incident.resolved_at.is_some_and(|at| at < cutoff)
            })
            .map(|incident| incident.id.clone())
            .collect();

        for id in &expired {
            state.incidents.remove(id);
            state.active.remove(id);
            state.pending.retain(|_, pending| *pending != *id);
        }
        state
            .history
            .retain(|entry| !expired.contains(&entry.incident_id));

        Ok(expired.len())
    }
}
