// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Tashkent;
use incident_desk_domain::{
    Branch, Department, Incident, IncidentId, IncidentStatus, NewIncident, PhotoRef, Priority,
    StatusChange, UserId,
};
use incident_desk_persistence::{
    CasOutcome, InMemoryStore, IncidentStore, PersistenceError, ReminderClaim, SlotClaim,
    Transition,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    Clock, IncidentStateMachine, ManualClock, Notifier, NotifyError, ReminderNotice,
    ReminderScheduler, SchedulerSettings, ServiceConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dispatched(IncidentId),
    Reminder(IncidentId, u32),
    Overdue(IncidentId),
    Resolved(IncidentId),
}

/// Captures every notification; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, event: Event) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport(String::from("chat api returned 502")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_dispatched(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.push(Event::Dispatched(incident.id.clone()))
    }

    async fn notify_reminder(
        &self,
        incident: &Incident,
        notice: ReminderNotice,
    ) -> Result<(), NotifyError> {
        self.push(Event::Reminder(incident.id.clone(), notice.threshold_minutes))
    }

    async fn notify_overdue(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.push(Event::Overdue(incident.id.clone()))
    }

    async fn notify_resolved(&self, incident: &Incident) -> Result<(), NotifyError> {
        self.push(Event::Resolved(incident.id.clone()))
    }
}

/// Wraps an in-memory store with injectable drift, races and per-id failures.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    pub inner: InMemoryStore,
    ghost_ids: Mutex<Vec<IncidentId>>,
    broken_id: Mutex<Option<IncidentId>>,
    overdue_races: Mutex<Vec<IncidentId>>,
    contended_id: Mutex<Option<IncidentId>>,
}

impl ScriptedStore {
    /// Makes `active_ids` report `id` until it is evicted.
    pub fn add_ghost(&self, id: IncidentId) {
        self.ghost_ids.lock().unwrap().push(id);
    }

    pub fn ghost_count(&self) -> usize {
        self.ghost_ids.lock().unwrap().len()
    }

    /// Makes `get` fail for `id`.
    pub fn break_id(&self, id: IncidentId) {
        *self.broken_id.lock().unwrap() = Some(id);
    }

    /// Moves `id` from `Open` to `Overdue` just before the next write that
    /// expects it to be `Open`, as the scheduler would mid-request.
    pub fn race_to_overdue(&self, id: IncidentId) {
        self.overdue_races.lock().unwrap().push(id);
    }

    /// Makes every write to `id` lose its compare-and-set to `Overdue`.
    pub fn contend(&self, id: IncidentId) {
        *self.contended_id.lock().unwrap() = Some(id);
    }

    fn take_overdue_race(&self, transition: &Transition) -> bool {
        if transition.from != IncidentStatus::Open {
            return false;
        }
        let mut races = self.overdue_races.lock().unwrap();
        let before: usize = races.len();
        races.retain(|id| *id != transition.incident_id);
        races.len() != before
    }
}

impl IncidentStore for ScriptedStore {
    fn next_daily_sequence(&self, date: NaiveDate) -> Result<u32, PersistenceError> {
        self.inner.next_daily_sequence(date)
    }

    fn insert_pending(&self, incident: &Incident) -> Result<SlotClaim, PersistenceError> {
        self.inner.insert_pending(incident)
    }

    fn pending_for_reporter(
        &self,
        reporter_id: &UserId,
    ) -> Result<Option<IncidentId>, PersistenceError> {
        self.inner.pending_for_reporter(reporter_id)
    }

    fn get(&self, incident_id: &IncidentId) -> Result<Option<Incident>, PersistenceError> {
        if self.broken_id.lock().unwrap().as_ref() == Some(incident_id) {
            return Err(PersistenceError::DatabaseError(String::from("disk I/O error")));
        }
        self.inner.get(incident_id)
    }

    fn apply_transition(&self, transition: &Transition) -> Result<CasOutcome, PersistenceError> {
        if self.take_overdue_race(transition) {
            self.inner.apply_transition(&Transition::new(
                transition.incident_id.clone(),
                IncidentStatus::Open,
                IncidentStatus::Overdue,
                transition.at,
            ))?;
        }
        if self.contended_id.lock().unwrap().as_ref() == Some(&transition.incident_id) {
            return Ok(CasOutcome::StatusMismatch(IncidentStatus::Overdue));
        }
        self.inner.apply_transition(transition)
    }

    fn record_reminder(
        &self,
        incident_id: &IncidentId,
        threshold_minutes: u32,
        expected: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<ReminderClaim, PersistenceError> {
        self.inner
            .record_reminder(incident_id, threshold_minutes, expected, at)
    }

    fn active_ids(&self) -> Result<Vec<IncidentId>, PersistenceError> {
        let mut ids: Vec<IncidentId> = self.inner.active_ids()?;
        ids.extend(self.ghost_ids.lock().unwrap().iter().cloned());
        Ok(ids)
    }

    fn evict_active(&self, incident_id: &IncidentId) -> Result<bool, PersistenceError> {
        let mut ghosts = self.ghost_ids.lock().unwrap();
        let before: usize = ghosts.len();
        ghosts.retain(|id| id != incident_id);
        let was_ghost: bool = ghosts.len() != before;
        drop(ghosts);
        Ok(self.inner.evict_active(incident_id)? || was_ghost)
    }

    fn list_active_for_responsible(
        &self,
        responsible_id: &UserId,
    ) -> Result<Vec<Incident>, PersistenceError> {
        self.inner.list_active_for_responsible(responsible_id)
    }

    fn history(&self, incident_id: &IncidentId) -> Result<Vec<StatusChange>, PersistenceError> {
        self.inner.history(incident_id)
    }

    fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        self.inner.purge_resolved_before(cutoff)
    }
}

/// 2026-10-16 at `hour:minute` in Tashkent.
pub fn tashkent(hour: u32, minute: u32) -> DateTime<Utc> {
    tashkent_on(16, hour, minute)
}

pub fn tashkent_on(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Tashkent
        .with_ymd_and_hms(2026, 10, day, hour, minute, 0)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn photo(reference: &str) -> PhotoRef {
    PhotoRef::new(reference).unwrap()
}

pub fn head_of(department: Department) -> UserId {
    user(&format!("head-{}", department.as_str()))
}

/// Default configuration with every department staffed.
pub fn test_config() -> ServiceConfig {
    let responsibles: BTreeMap<Department, UserId> = Department::ALL
        .into_iter()
        .map(|department| (department, head_of(department)))
        .collect();
    ServiceConfig {
        responsibles,
        ..ServiceConfig::default()
    }
}

pub fn intake(reporter: &str, priority: Priority) -> NewIncident {
    NewIncident {
        reporter_id: user(reporter),
        branch: Branch::Chilonzor,
        department: Department::Procurement,
        priority,
        short_description: String::from("Fryer not heating"),
        full_message: String::from("The left fryer stopped heating during lunch service."),
    }
}

pub struct Harness {
    pub store: Arc<dyn IncidentStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub machine: Arc<IncidentStateMachine>,
    pub scheduler: ReminderScheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn IncidentStore>) -> Self {
        let clock: Arc<ManualClock> = Arc::new(ManualClock::new(tashkent(10, 0)));
        Self::with_store_and_clock(store, clock)
    }

    /// A fresh process over an existing store and clock, as after a restart.
    pub fn with_store_and_clock(store: Arc<dyn IncidentStore>, clock: Arc<ManualClock>) -> Self {
        let notifier: Arc<RecordingNotifier> = Arc::new(RecordingNotifier::default());
        let config: ServiceConfig = test_config();
        let machine: Arc<IncidentStateMachine> = Arc::new(
            IncidentStateMachine::from_config(
                &config,
                Arc::clone(&store),
                Arc::clone(&clock) as Arc<dyn Clock>,
                Arc::clone(&notifier) as Arc<dyn Notifier>,
            )
            .unwrap(),
        );
        let scheduler: ReminderScheduler = ReminderScheduler::new(
            Arc::clone(&machine),
            SchedulerSettings::from_config(&config),
        );
        Self {
            store,
            clock,
            notifier,
            machine,
            scheduler,
        }
    }

    /// Creates and confirms an incident, leaving it `Open`.
    pub async fn open_incident(&self, reporter: &str, priority: Priority) -> Incident {
        let created: Incident = self
            .machine
            .create_incident(intake(reporter, priority))
            .await
            .unwrap();
        self.machine
            .confirm_problem(&created.id, photo("problem-1"))
            .await
            .unwrap()
    }

    /// Takes an `Open` incident through to `Resolved`.
    pub async fn resolve(&self, incident: &Incident) -> Incident {
        self.machine
            .record_resolution(&incident.id, &incident.responsible_id, "Replaced the thermostat")
            .unwrap();
        self.machine
            .confirm_resolution(&incident.id, photo("solution-1"))
            .await
            .unwrap()
    }
}
