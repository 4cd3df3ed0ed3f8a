// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod deadline;
mod directory;
mod error;
mod incident;
mod status;
mod types;

#[cfg(test)]
mod tests;

pub use deadline::{
    BusinessHours, DeadlineDecision, DeadlinePolicy, DurationSource, EstimateBounds,
    PriorityDurations,
};
pub use directory::DepartmentDirectory;
pub use error::DomainError;
pub use incident::{Incident, IncidentView, NewIncident, StatusChange};
pub use status::IncidentStatus;
pub use types::{Branch, Department, IncidentId, PhotoRef, Priority, UserId};
