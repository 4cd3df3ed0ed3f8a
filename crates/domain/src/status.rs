// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Incident status tracking and transition logic.
//!
//! Statuses move strictly forward along
//! `Created → Open → Overdue → PendingResolutionPhoto → Resolved`,
//! where `Overdue` may be skipped. No transition ever returns to `Created`,
//! and `Resolved` is terminal.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Reported, waiting for the reporter's problem photo
    Created,
    /// Dispatched to the responsible person; the deadline is authoritative
    Open,
    /// Deadline passed while unresolved
    Overdue,
    /// Resolution text recorded, waiting for the solution photo
    PendingResolutionPhoto,
    /// Closed
    Resolved,
}

impl IncidentStatus {
    /// Returns the string representation of the status.
    ///
    /// This is used for persistence and API serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Overdue => "overdue",
            Self::PendingResolutionPhoto => "pending_resolution_photo",
            Self::Resolved => "resolved",
        }
    }

    /// Parses a status from its string representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidIncidentStatus` if the string is not a valid status.
    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "created" => Ok(Self::Created),
            "open" => Ok(Self::Open),
            "overdue" => Ok(Self::Overdue),
            "pending_resolution_photo" => Ok(Self::PendingResolutionPhoto),
            "resolved" => Ok(Self::Resolved),
            _ => Err(DomainError::InvalidIncidentStatus {
                status: s.to_string(),
            }),
        }
    }

    /// Position of this status along the lifecycle.
    ///
    /// Every permitted transition strictly increases the rank.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Open => 1,
            Self::Overdue => 2,
            Self::PendingResolutionPhoto => 3,
            Self::Resolved => 4,
        }
    }

    /// Returns true if this status is terminal (cannot transition to another state).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Returns true if an incident in this status belongs in the active index.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if a resolution may be recorded from this status.
    #[must_use]
    pub const fn accepts_resolution(&self) -> bool {
        matches!(self, Self::Open | Self::Overdue)
    }

    /// Validates if a transition from this status to another is permitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "cannot transition from terminal state".to_string(),
            });
        }

        let valid = match self {
            Self::Created => matches!(new_status, Self::Open),
            Self::Open => matches!(new_status, Self::Overdue | Self::PendingResolutionPhoto),
            Self::Overdue => matches!(new_status, Self::PendingResolutionPhoto),
            Self::PendingResolutionPhoto => matches!(new_status, Self::Resolved),
            Self::Resolved => false,
        };

        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "transition not permitted by incident lifecycle rules".to_string(),
            })
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
