// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::types::Department;

/// Errors that can occur during domain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Priority string is not one of the known tiers.
    InvalidPriority(String),
    /// Branch is not part of the branch catalog.
    UnknownBranch(String),
    /// Department is not part of the department catalog.
    UnknownDepartment(String),
    /// Incident status string is not recognized.
    InvalidIncidentStatus {
        /// The unrecognized status value.
        status: String,
    },
    /// Incident identifier does not follow `#YYYYMMDD-NNN`.
    InvalidIncidentId(String),
    /// A user identifier is empty or malformed.
    InvalidUserId(String),
    /// A photo reference is empty.
    InvalidPhotoRef,
    /// Free text (description, message, resolution) is empty.
    EmptyText {
        /// The field that was empty.
        field: &'static str,
    },
    /// A status transition is not permitted by the lifecycle.
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
        /// Why the transition was rejected.
        reason: String,
    },
    /// The configured timezone is not a known IANA name.
    InvalidTimezone(String),
    /// Business hours are malformed.
    InvalidBusinessHours {
        /// Description of the problem.
        reason: String,
    },
    /// A configured duration is zero or negative.
    InvalidDuration {
        /// What the duration configures.
        field: String,
    },
    /// A reminder threshold is zero or listed twice.
    InvalidReminderThreshold(u32),
    /// No responsible person is configured for a department.
    NoResponsibleForDepartment(Department),
    /// Date arithmetic overflow.
    DateArithmeticOverflow {
        /// Description of the operation that failed.
        operation: String,
    },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPriority(value) => write!(f, "Invalid priority: {value}"),
            Self::UnknownBranch(value) => write!(f, "Unknown branch: {value}"),
            Self::UnknownDepartment(value) => write!(f, "Unknown department: {value}"),
            Self::InvalidIncidentStatus { status } => {
                write!(f, "Invalid incident status: {status}")
            }
            Self::InvalidIncidentId(value) => {
                write!(
                    f,
                    "Invalid incident id '{value}': expected format #YYYYMMDD-NNN"
                )
            }
            Self::InvalidUserId(value) => write!(f, "Invalid user id: '{value}'"),
            Self::InvalidPhotoRef => write!(f, "Photo reference must not be empty"),
            Self::EmptyText { field } => write!(f, "Field '{field}' must not be empty"),
            Self::InvalidStatusTransition { from, to, reason } => {
                write!(f, "Invalid status transition from {from} to {to}: {reason}")
            }
            Self::InvalidTimezone(value) => write!(f, "Invalid timezone: {value}"),
            Self::InvalidBusinessHours { reason } => {
                write!(f, "Invalid business hours: {reason}")
            }
            Self::InvalidDuration { field } => {
                write!(f, "Duration for '{field}' must be greater than zero")
            }
            Self::InvalidReminderThreshold(minutes) => {
                write!(
                    f,
                    "Reminder threshold {minutes} must be positive and listed once"
                )
            }
            Self::NoResponsibleForDepartment(department) => {
                write!(
                    f,
                    "No responsible person is configured for department {department}"
                )
            }
            Self::DateArithmeticOverflow { operation } => {
                write!(f, "Date arithmetic overflow while {operation}")
            }
        }
    }
}

impl std::error::Error for DomainError {}
