// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Incident lifecycle and deadline enforcement.
//!
//! - [`IncidentStateMachine`] owns every status transition
//! - [`ReporterGate`] keeps each reporter to one unconfirmed incident
//! - [`ReminderScheduler`] sends reminders and marks incidents overdue
//!
//! Time, notification delivery and deadline estimation are injected through
//! [`Clock`], [`Notifier`] and [`DeadlineEstimator`].

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
#![allow(clippy::multiple_crate_versions)]

mod clock;
mod config;
mod error;
mod estimator;
mod gate;
mod machine;
mod notifier;
mod scheduler;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BaseMinutes, ServiceConfig};
pub use error::CoreError;
pub use estimator::{DeadlineEstimator, EstimateError, EstimateRequest};
pub use gate::ReporterGate;
pub use machine::{IncidentStateMachine, OverdueOutcome};
pub use notifier::{NotificationDispatcher, Notifier, NotifyError, ReminderNotice};
pub use scheduler::{
    ReminderScheduler, SchedulerSettings, SchedulerStats, StatsSnapshot, TickReport,
};
