// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for the incident desk.
//!
//! The [`IncidentStore`] trait is the storage contract the state machine and
//! reminder scheduler are written against. Two implementations exist:
//!
//! - [`Persistence`]: Diesel over `SQLite`, durable across restarts
//! - [`InMemoryStore`]: process-local, for tests and ephemeral runs
//!
//! ## Schema
//!
//! - `incidents`: one row per incident record
//! - `active_incidents`: ids the reminder scheduler scans
//! - `pending_slots`: the one unconfirmed incident per reporter
//! - `reminders_sent`: `(incident, threshold)` pairs already delivered
//! - `incident_history`: append-only status transitions
//! - `daily_counters`: per business date id sequence
//!
//! ## Testing Philosophy
//!
//! - Contract tests run the same scenarios against both stores
//! - `SQLite` tests use a fresh shared in-memory database per test

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

use chrono::{DateTime, NaiveDate, Utc};
use diesel::SqliteConnection;
use incident_desk_domain::{Incident, IncidentId, IncidentStatus, StatusChange, UserId};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::error;

mod backend;
mod data_models;
mod diesel_schema;
mod error;
mod memory;
mod mutations;
mod queries;
mod store;

#[cfg(test)]
mod tests;

pub use error::PersistenceError;
pub use memory::InMemoryStore;
pub use store::{
    CasOutcome, IncidentStore, ReminderClaim, SlotClaim, Transition, TransitionChanges,
};

/// Atomic counter for generating unique in-memory database names.
///
/// Each call to `new_in_memory()` receives a unique sequential ID.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `SQLite`-backed incident store.
///
/// A single connection is shared behind a mutex; every trait call holds it
/// for the duration of one statement or one transaction.
pub struct Persistence {
    conn: Mutex<SqliteConnection>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

impl Persistence {
    /// Creates a new persistence adapter with an in-memory `SQLite` database.
    ///
    /// Each call receives a unique database instance via atomic counter,
    /// ensuring deterministic test isolation without time-based collisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let db_id = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let shared_memory_url = format!("file:incident_desk_mem_{db_id}?mode=memory&cache=shared");

        let mut conn: SqliteConnection = backend::sqlite::initialize_database(&shared_memory_url)?;
        backend::sqlite::verify_foreign_key_enforcement(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a new persistence adapter with a file-based `SQLite` database.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `SQLite` database file
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new_with_file<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            PersistenceError::InitializationError("Invalid database path".to_string())
        })?;

        let mut conn: SqliteConnection = backend::sqlite::initialize_database(path_str)?;
        backend::sqlite::enable_wal_mode(&mut conn)?;
        backend::sqlite::verify_foreign_key_enforcement(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Verifies that foreign key enforcement is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if foreign key enforcement is not enabled.
    pub fn verify_foreign_key_enforcement(&self) -> Result<(), PersistenceError> {
        backend::sqlite::verify_foreign_key_enforcement(&mut *self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteConnection>, PersistenceError> {
        self.conn.lock().map_err(|_| {
            error!("SQLite connection mutex poisoned");
            PersistenceError::Other(String::from("database connection lock poisoned"))
        })
    }
}

impl IncidentStore for Persistence {
    fn next_daily_sequence(&self, date: NaiveDate) -> Result<u32, PersistenceError> {
        mutations::incidents::next_daily_sequence(&mut *self.lock()?, date)
    }

    fn insert_pending(&self, incident: &Incident) -> Result<SlotClaim, PersistenceError> {
        mutations::incidents::insert_pending(&mut *self.lock()?, incident)
    }

    fn pending_for_reporter(
        &self,
        reporter_id: &UserId,
    ) -> Result<Option<IncidentId>, PersistenceError> {
        queries::incidents::pending_for_reporter(&mut *self.lock()?, reporter_id.as_str())
    }

    fn get(&self, incident_id: &IncidentId) -> Result<Option<Incident>, PersistenceError> {
        queries::incidents::find_incident(&mut *self.lock()?, incident_id.as_str())
    }

    fn apply_transition(&self, transition: &Transition) -> Result<CasOutcome, PersistenceError> {
        mutations::incidents::apply_transition(&mut *self.lock()?, transition)
    }

    fn record_reminder(
        &self,
        incident_id: &IncidentId,
        threshold_minutes: u32,
        expected: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<ReminderClaim, PersistenceError> {
        mutations::incidents::record_reminder(
            &mut *self.lock()?,
            incident_id.as_str(),
            threshold_minutes,
            expected,
            at,
        )
    }

    fn active_ids(&self) -> Result<Vec<IncidentId>, PersistenceError> {
        queries::incidents::active_ids(&mut *self.lock()?)
    }

    fn evict_active(&self, incident_id: &IncidentId) -> Result<bool, PersistenceError> {
        mutations::incidents::evict_active(&mut *self.lock()?, incident_id.as_str())
    }

    fn list_active_for_responsible(
        &self,
        responsible_id: &UserId,
    ) -> Result<Vec<Incident>, PersistenceError> {
        queries::incidents::active_for_responsible(&mut *self.lock()?, responsible_id.as_str())
    }

    fn history(&self, incident_id: &IncidentId) -> Result<Vec<StatusChange>, PersistenceError> {
        queries::incidents::history(&mut *self.lock()?, incident_id.as_str())
    }

    fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        mutations::incidents::purge_resolved_before(&mut *self.lock()?, cutoff)
    }
}
