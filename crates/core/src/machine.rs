// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The incident lifecycle.
//!
//! ```text
//! Created -> Open -> Overdue -> PendingResolutionPhoto -> Resolved
//!              \_____________________^
//! ```
//!
//! Every transition is a compare-and-set against the status the caller last
//! read. A lost race surfaces as `InvalidState` (or `AlreadyResolved`) rather
//! than overwriting whatever won. Notifications are sent after the transition
//! is stored and never undo it.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use incident_desk_domain::{
    DeadlineDecision, DeadlinePolicy, DepartmentDirectory, DurationSource, Incident, IncidentId,
    IncidentStatus, IncidentView, NewIncident, PhotoRef, StatusChange, UserId,
};
use incident_desk_persistence::{CasOutcome, IncidentStore, Transition, TransitionChanges};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::error::CoreError;
use crate::estimator::{DeadlineEstimator, EstimateRequest};
use crate::gate::ReporterGate;
use crate::notifier::{NotificationDispatcher, Notifier};

/// How many times `record_resolution` re-reads the record after losing a
/// race against another writer.
const RESOLUTION_ATTEMPTS: usize = 3;

/// Result of [`IncidentStateMachine::mark_overdue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverdueOutcome {
    /// This call moved the incident to `Overdue`.
    Marked(Incident),
    /// The incident was already `Overdue`; nothing changed.
    AlreadyOverdue,
}

struct EstimatorHandle {
    estimator: Arc<dyn DeadlineEstimator>,
    timeout: Duration,
}

/// Owns every status transition of every incident.
pub struct IncidentStateMachine {
    store: Arc<dyn IncidentStore>,
    gate: ReporterGate,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: DeadlinePolicy,
    directory: DepartmentDirectory,
    estimator: Option<EstimatorHandle>,
}

impl std::fmt::Debug for IncidentStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentStateMachine")
            .field("policy", &self.policy)
            .field("directory", &self.directory)
            .field("dispatcher", &self.dispatcher)
            .field("has_estimator", &self.estimator.is_some())
            .finish_non_exhaustive()
    }
}

impl IncidentStateMachine {
    #[must_use]
    pub fn new(
        store: Arc<dyn IncidentStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: DeadlinePolicy,
        directory: DepartmentDirectory,
    ) -> Self {
        Self {
            gate: ReporterGate::new(Arc::clone(&store)),
            store,
            clock,
            dispatcher,
            policy,
            directory,
            estimator: None,
        }
    }

    /// Builds a state machine from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Domain` if the configuration does not validate.
    pub fn from_config(
        config: &ServiceConfig,
        store: Arc<dyn IncidentStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let dispatcher: Arc<NotificationDispatcher> = Arc::new(NotificationDispatcher::new(
            notifier,
            config.notify_timeout(),
        ));
        Ok(Self::new(
            store,
            clock,
            dispatcher,
            config.deadline_policy()?,
            config.directory(),
        ))
    }

    /// Consults `estimator` for every new incident, giving up after `timeout`.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn DeadlineEstimator>, timeout: Duration) -> Self {
        self.estimator = Some(EstimatorHandle { estimator, timeout });
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.store
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub const fn gate(&self) -> &ReporterGate {
        &self.gate
    }

    #[must_use]
    pub const fn policy(&self) -> &DeadlinePolicy {
        &self.policy
    }

    /// The timezone views are rendered in.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.policy.business_hours().timezone()
    }

    /// Registers a new incident in `Created` status.
    ///
    /// The deadline is fixed here and never recomputed. The id's date is the
    /// business date of the creation instant.
    ///
    /// # Errors
    ///
    /// * `PendingConfirmationExists` if the reporter still has an incident
    ///   awaiting its problem photo
    /// * `Domain` for empty text or a department nobody is responsible for
    /// * `StoreUnavailable` if the store cannot be reached
    pub async fn create_incident(&self, intake: NewIncident) -> Result<Incident, CoreError> {
        self.create_inner(intake)
            .await
            .inspect_err(|e| log_failure("create_incident", None, e))
    }

    async fn create_inner(&self, intake: NewIncident) -> Result<Incident, CoreError> {
        intake.validate()?;
        self.gate.try_begin(&intake.reporter_id)?;
        let responsible_id: UserId = self.directory.responsible_for(intake.department)?.clone();

        let created_at: DateTime<Utc> = self.clock.now();
        let estimate: Option<chrono::Duration> = self.estimate(&intake, created_at).await;
        let decision: DeadlineDecision = self.policy.compute(intake.priority, estimate, created_at)?;
        if decision.source == DurationSource::RejectedEstimate {
            debug!(
                priority = %intake.priority,
                estimate = ?estimate,
                "Estimate out of bounds, using base duration"
            );
        }

        let business_date: NaiveDate = self.policy.business_hours().business_date(created_at);
        let sequence: u32 = self.store.next_daily_sequence(business_date)?;
        let incident: Incident = Incident::created(
            IncidentId::from_parts(business_date, sequence),
            intake,
            decision.deadline,
            responsible_id,
            created_at,
        );
        self.gate.admit(&incident)?;

        info!(
            incident_id = %incident.id,
            reporter_id = %incident.reporter_id,
            priority = %incident.priority,
            department = %incident.department,
            deadline = %incident.deadline,
            source = ?decision.source,
            moved_to_business_hours = decision.was_moved_to_business_hours(),
            "Incident created"
        );
        Ok(incident)
    }

    async fn estimate(
        &self,
        intake: &NewIncident,
        created_at: DateTime<Utc>,
    ) -> Option<chrono::Duration> {
        let handle: &EstimatorHandle = self.estimator.as_ref()?;
        let request = EstimateRequest {
            priority: intake.priority,
            short_description: &intake.short_description,
            full_message: &intake.full_message,
            created_at,
        };
        match tokio::time::timeout(handle.timeout, handle.estimator.estimate(&request)).await {
            Ok(Ok(duration)) => Some(duration),
            Ok(Err(e)) => {
                warn!(error = %e, "Deadline estimation failed, using base duration");
                None
            }
            Err(_) => {
                warn!("Deadline estimation timed out, using base duration");
                None
            }
        }
    }

    /// Attaches the problem photo and dispatches the incident.
    ///
    /// Frees the reporter's pending slot in the same store write.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless the incident is `Created`, or
    /// `StoreUnavailable`.
    pub async fn confirm_problem(
        &self,
        incident_id: &IncidentId,
        photo: PhotoRef,
    ) -> Result<Incident, CoreError> {
        let result: Result<Incident, CoreError> = self.confirm_problem_inner(incident_id, photo);
        let updated: Incident =
            result.inspect_err(|e| log_failure("confirm_problem", Some(incident_id), e))?;
        self.dispatcher.dispatched(&updated).await;
        Ok(updated)
    }

    fn confirm_problem_inner(
        &self,
        incident_id: &IncidentId,
        photo: PhotoRef,
    ) -> Result<Incident, CoreError> {
        const OPERATION: &str = "confirm the problem photo of";

        let incident: Incident = self.load(incident_id)?;
        if incident.status != IncidentStatus::Created {
            return Err(invalid_state(incident_id, incident.status, OPERATION));
        }

        let transition: Transition = Transition::new(
            incident_id.clone(),
            IncidentStatus::Created,
            IncidentStatus::Open,
            self.clock.now(),
        )
        .by(incident.reporter_id)
        .with_changes(TransitionChanges {
            problem_photo: Some(photo),
            ..TransitionChanges::default()
        });
        self.apply(&transition, OPERATION)
    }

    /// Records the responsible person's resolution text.
    ///
    /// Accepted from `Open` and `Overdue`. If the scheduler moves the incident
    /// from `Open` to `Overdue` between the read and the write, the record is
    /// re-read and the write retried.
    ///
    /// # Errors
    ///
    /// * `NotFound`
    /// * `AlreadyResolved` if the incident is `Resolved`
    /// * `NotResponsible` if `caller_id` is not the responsible person
    /// * `InvalidState` for `Created` or `PendingResolutionPhoto`
    /// * `Domain` if `text` is blank
    /// * `StoreUnavailable`
    pub fn record_resolution(
        &self,
        incident_id: &IncidentId,
        caller_id: &UserId,
        text: &str,
    ) -> Result<Incident, CoreError> {
        self.record_resolution_inner(incident_id, caller_id, text)
            .inspect_err(|e| log_failure("record_resolution", Some(incident_id), e))
    }

    fn record_resolution_inner(
        &self,
        incident_id: &IncidentId,
        caller_id: &UserId,
        text: &str,
    ) -> Result<Incident, CoreError> {
        const OPERATION: &str = "record a resolution for";

        let text: &str = text.trim();
        if text.is_empty() {
            return Err(incident_desk_domain::DomainError::EmptyText {
                field: "resolution",
            }
            .into());
        }

        let mut last_seen: IncidentStatus = IncidentStatus::Open;
        for attempt in 1..=RESOLUTION_ATTEMPTS {
            let incident: Incident = self.load(incident_id)?;
            if incident.status == IncidentStatus::Resolved {
                return Err(CoreError::AlreadyResolved(incident_id.clone()));
            }
            if incident.responsible_id != *caller_id {
                return Err(CoreError::NotResponsible {
                    incident_id: incident_id.clone(),
                    caller_id: caller_id.clone(),
                });
            }
            if !incident.status.accepts_resolution() {
                return Err(invalid_state(incident_id, incident.status, OPERATION));
            }

            let transition: Transition = Transition::new(
                incident_id.clone(),
                incident.status,
                IncidentStatus::PendingResolutionPhoto,
                self.clock.now(),
            )
            .by(caller_id.clone())
            .with_changes(TransitionChanges {
                resolution: Some(text.to_string()),
                resolver_id: Some(caller_id.clone()),
                ..TransitionChanges::default()
            });

            match self.store.apply_transition(&transition)? {
                CasOutcome::Applied(updated) => {
                    log_transition(&transition);
                    return Ok(updated);
                }
                CasOutcome::StatusMismatch(current) => {
                    debug!(
                        incident_id = %incident_id,
                        expected = %incident.status,
                        current = %current,
                        attempt,
                        "Status changed under resolution, re-reading"
                    );
                    last_seen = current;
                }
                CasOutcome::Missing => return Err(CoreError::NotFound(incident_id.clone())),
            }
        }

        Err(invalid_state(incident_id, last_seen, OPERATION))
    }

    /// Attaches the solution photo and resolves the incident.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless the incident is
    /// `PendingResolutionPhoto`, or `StoreUnavailable`.
    pub async fn confirm_resolution(
        &self,
        incident_id: &IncidentId,
        photo: PhotoRef,
    ) -> Result<Incident, CoreError> {
        let result: Result<Incident, CoreError> = self.confirm_resolution_inner(incident_id, photo);
        let resolved: Incident =
            result.inspect_err(|e| log_failure("confirm_resolution", Some(incident_id), e))?;
        self.dispatcher.resolved(&resolved).await;
        Ok(resolved)
    }

    fn confirm_resolution_inner(
        &self,
        incident_id: &IncidentId,
        photo: PhotoRef,
    ) -> Result<Incident, CoreError> {
        const OPERATION: &str = "confirm the solution photo of";

        let incident: Incident = self.load(incident_id)?;
        if incident.status != IncidentStatus::PendingResolutionPhoto {
            return Err(invalid_state(incident_id, incident.status, OPERATION));
        }

        let now: DateTime<Utc> = self.clock.now();
        let actor: UserId = incident.resolver_id.unwrap_or(incident.responsible_id);
        let transition: Transition = Transition::new(
            incident_id.clone(),
            IncidentStatus::PendingResolutionPhoto,
            IncidentStatus::Resolved,
            now,
        )
        .by(actor)
        .with_changes(TransitionChanges {
            solution_photo: Some(photo),
            resolved_at: Some(now),
            ..TransitionChanges::default()
        });
        self.apply(&transition, OPERATION)
    }

    /// Moves an `Open` incident past its deadline to `Overdue`.
    ///
    /// Calling it on an incident that is already `Overdue` changes nothing and
    /// sends no notification.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` for any status other than `Open` or
    /// `Overdue`, or `StoreUnavailable`.
    pub async fn mark_overdue(&self, incident_id: &IncidentId) -> Result<OverdueOutcome, CoreError> {
        let outcome: OverdueOutcome = self
            .mark_overdue_inner(incident_id)
            .inspect_err(|e| log_failure("mark_overdue", Some(incident_id), e))?;
        if let OverdueOutcome::Marked(incident) = &outcome {
            self.dispatcher.overdue(incident).await;
        }
        Ok(outcome)
    }

    fn mark_overdue_inner(&self, incident_id: &IncidentId) -> Result<OverdueOutcome, CoreError> {
        const OPERATION: &str = "mark overdue";

        let incident: Incident = self.load(incident_id)?;
        match incident.status {
            IncidentStatus::Overdue => return Ok(OverdueOutcome::AlreadyOverdue),
            IncidentStatus::Open => {}
            other => return Err(invalid_state(incident_id, other, OPERATION)),
        }

        let transition: Transition = Transition::new(
            incident_id.clone(),
            IncidentStatus::Open,
            IncidentStatus::Overdue,
            self.clock.now(),
        );
        match self.apply(&transition, OPERATION) {
            Ok(updated) => Ok(OverdueOutcome::Marked(updated)),
            Err(CoreError::InvalidState {
                status: IncidentStatus::Overdue,
                ..
            }) => Ok(OverdueOutcome::AlreadyOverdue),
            Err(e) => Err(e),
        }
    }

    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub fn incident(&self, incident_id: &IncidentId) -> Result<Incident, CoreError> {
        self.load(incident_id)
            .inspect_err(|e| log_failure("incident", Some(incident_id), e))
    }

    /// Returns the incident as seen now from the business timezone.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub fn get_incident(&self, incident_id: &IncidentId) -> Result<IncidentView, CoreError> {
        let incident: Incident = self.incident(incident_id)?;
        Ok(IncidentView::project(&incident, self.clock.now(), self.timezone()))
    }

    /// Unresolved incidents assigned to `responsible_id`, most urgent first:
    /// by priority, then by deadline.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` or `CorruptRecord`.
    pub fn list_active_for_responsible(
        &self,
        responsible_id: &UserId,
    ) -> Result<Vec<IncidentView>, CoreError> {
        let mut incidents: Vec<Incident> = self
            .store
            .list_active_for_responsible(responsible_id)
            .map_err(CoreError::from)
            .inspect_err(|e| log_failure("list_active_for_responsible", None, e))?;
        incidents.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.deadline.cmp(&b.deadline))
                .then_with(|| a.id.cmp(&b.id))
        });

        let now: DateTime<Utc> = self.clock.now();
        let tz: Tz = self.timezone();
        Ok(incidents
            .iter()
            .map(|incident| IncidentView::project(incident, now, tz))
            .collect())
    }

    /// Status history of an incident, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the incident does not exist, or `StoreUnavailable`.
    pub fn history(&self, incident_id: &IncidentId) -> Result<Vec<StatusChange>, CoreError> {
        let entries: Vec<StatusChange> = self
            .store
            .history(incident_id)
            .map_err(CoreError::from)
            .inspect_err(|e| log_failure("history", Some(incident_id), e))?;
        if entries.is_empty() {
            // Purged or never existed.
            self.incident(incident_id)?;
        }
        Ok(entries)
    }

    fn load(&self, incident_id: &IncidentId) -> Result<Incident, CoreError> {
        self.store
            .get(incident_id)?
            .ok_or_else(|| CoreError::NotFound(incident_id.clone()))
    }

    fn apply(&self, transition: &Transition, operation: &'static str) -> Result<Incident, CoreError> {
        transition.from.validate_transition(transition.to)?;
        match self.store.apply_transition(transition)? {
            CasOutcome::Applied(updated) => {
                log_transition(transition);
                Ok(updated)
            }
            CasOutcome::StatusMismatch(current) => {
                Err(invalid_state(&transition.incident_id, current, operation))
            }
            CasOutcome::Missing => Err(CoreError::NotFound(transition.incident_id.clone())),
        }
    }
}

fn invalid_state(
    incident_id: &IncidentId,
    status: IncidentStatus,
    operation: &'static str,
) -> CoreError {
    CoreError::InvalidState {
        incident_id: incident_id.clone(),
        status,
        operation,
    }
}

fn log_transition(transition: &Transition) {
    info!(
        incident_id = %transition.incident_id,
        from = %transition.from,
        to = %transition.to,
        actor_id = ?transition.actor_id.as_ref().map(UserId::as_str),
        "Incident transitioned"
    );
}

fn log_failure(operation: &'static str, incident_id: Option<&IncidentId>, err: &CoreError) {
    let incident_id: &str = incident_id.map_or("-", IncidentId::as_str);
    match err {
        CoreError::StoreUnavailable(_)
        | CoreError::CorruptRecord(_)
        | CoreError::StoreFault(_) => {
            error!(operation, incident_id, error = %err, "Incident store failure");
        }
        _ => debug!(operation, incident_id, error = %err, "Request rejected"),
    }
}
