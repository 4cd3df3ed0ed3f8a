// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use incident_desk_domain::{DomainError, IncidentId, IncidentStatus, UserId};
use incident_desk_persistence::PersistenceError;
use thiserror::Error;

/// Errors surfaced by incident operations.
///
/// Everything except `StoreUnavailable` describes a problem with the request
/// itself and will fail the same way if retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Incident {0} not found")]
    NotFound(IncidentId),

    #[error("Cannot {operation} incident {incident_id} while it is {status}")]
    InvalidState {
        incident_id: IncidentId,
        status: IncidentStatus,
        operation: &'static str,
    },

    #[error("Incident {0} is already resolved")]
    AlreadyResolved(IncidentId),

    #[error("User {caller_id} is not responsible for incident {incident_id}")]
    NotResponsible {
        incident_id: IncidentId,
        caller_id: UserId,
    },

    #[error("Incident {0} is still waiting for its problem photo")]
    PendingConfirmationExists(IncidentId),

    #[error("Incident store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Stored incident data is corrupt: {0}")]
    CorruptRecord(String),

    #[error("Incident store refused the operation: {0}")]
    StoreFault(String),
}

impl CoreError {
    /// Returns true if the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<PersistenceError> for CoreError {
    fn from(err: PersistenceError) -> Self {
        if err.is_unavailable() {
            return Self::StoreUnavailable(err.to_string());
        }
        match err {
            PersistenceError::IncidentNotFound(incident_id) => Self::NotFound(incident_id),
            PersistenceError::CorruptRecord { .. } => Self::CorruptRecord(err.to_string()),
            _ => Self::StoreFault(err.to_string()),
        }
    }
}
