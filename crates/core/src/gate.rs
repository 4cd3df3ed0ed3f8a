// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Single-pending-incident enforcement.
//!
//! The pending slot lives in the store, not in process memory. `admit` is the
//! authoritative check: the store claims the slot and writes the incident in
//! one step, so two concurrent reports from one reporter cannot both pass.
//! `try_begin` is an early, advisory check that lets intake fail before it
//! spends time on deadline estimation.

use incident_desk_domain::{Incident, IncidentId, UserId};
use incident_desk_persistence::{IncidentStore, SlotClaim};
use std::sync::Arc;
use tracing::debug;

use crate::error::CoreError;

#[derive(Clone)]
pub struct ReporterGate {
    store: Arc<dyn IncidentStore>,
}

impl std::fmt::Debug for ReporterGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReporterGate").finish_non_exhaustive()
    }
}

impl ReporterGate {
    #[must_use]
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    /// Fails if `reporter_id` already has an incident awaiting its problem
    /// photo.
    ///
    /// # Errors
    ///
    /// Returns `PendingConfirmationExists` with the pending incident's id, or
    /// `StoreUnavailable`.
    pub fn try_begin(&self, reporter_id: &UserId) -> Result<(), CoreError> {
        match self.store.pending_for_reporter(reporter_id)? {
            Some(existing) => {
                debug!(reporter_id = %reporter_id, pending = %existing, "Reporter gate closed");
                Err(CoreError::PendingConfirmationExists(existing))
            }
            None => Ok(()),
        }
    }

    /// Stores `incident` while claiming its reporter's pending slot.
    ///
    /// # Errors
    ///
    /// Returns `PendingConfirmationExists` if the slot was taken in the
    /// meantime, or `StoreUnavailable`.
    pub fn admit(&self, incident: &Incident) -> Result<(), CoreError> {
        match self.store.insert_pending(incident)? {
            SlotClaim::Claimed => Ok(()),
            SlotClaim::Occupied(existing) => {
                debug!(
                    reporter_id = %incident.reporter_id,
                    pending = %existing,
                    rejected = %incident.id,
                    "Lost pending slot race"
                );
                Err(CoreError::PendingConfirmationExists(existing))
            }
        }
    }

    /// Returns the reporter's pending incident, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be read.
    pub fn pending(&self, reporter_id: &UserId) -> Result<Option<IncidentId>, CoreError> {
        Ok(self.store.pending_for_reporter(reporter_id)?)
    }
}
