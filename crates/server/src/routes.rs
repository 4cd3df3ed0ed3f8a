// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! HTTP intake and query routes.
//!
//! Request bodies carry raw strings for user-supplied identifiers; they are
//! parsed into domain types here so a malformed id is a 400 rather than a
//! deserialization failure.

use axum::{
    Json, Router,
    extract::{FromRef, Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use incident_desk::{CoreError, IncidentStateMachine, ReminderScheduler, StatsSnapshot};
use incident_desk_domain::{
    Branch, Department, DomainError, Incident, IncidentId, IncidentView, NewIncident, PhotoRef,
    Priority, StatusChange, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::live::{LiveEventBroadcaster, live_events_handler};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub machine: Arc<IncidentStateMachine>,
    pub scheduler: Arc<ReminderScheduler>,
    pub broadcaster: Arc<LiveEventBroadcaster>,
}

impl FromRef<AppState> for Arc<LiveEventBroadcaster> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.broadcaster)
    }
}

/// Body of `POST /incidents`, produced by the intake classifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateIncidentRequest {
    pub reporter_id: String,
    pub branch: Branch,
    pub department: Department,
    pub priority: Priority,
    pub short_description: String,
    pub full_message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoRequest {
    /// Opaque reference from the media layer.
    pub photo_ref: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolutionRequest {
    pub caller_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorResponse {
    error: bool,
    message: String,
}

/// HTTP error wrapper that implements `IntoResponse`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body: Json<ErrorResponse> = Json(ErrorResponse {
            error: true,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        let status: StatusCode = match &err {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidState { .. }
            | CoreError::AlreadyResolved(_)
            | CoreError::PendingConfirmationExists(_) => StatusCode::CONFLICT,
            CoreError::NotResponsible { .. } => StatusCode::FORBIDDEN,
            CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Domain(_) => StatusCode::BAD_REQUEST,
            CoreError::CorruptRecord(_) | CoreError::StoreFault(_) => {
                error!(error = %err, "Incident store fault");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for HttpError {
    fn from(err: DomainError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

/// Accepts ids with or without the leading `#`, which is awkward in URLs.
fn parse_incident_id(raw: &str) -> Result<IncidentId, HttpError> {
    let id: IncidentId = if raw.starts_with('#') {
        IncidentId::parse(raw)?
    } else {
        IncidentId::parse(&format!("#{raw}"))?
    };
    Ok(id)
}

fn view(state: &AppState, incident: &Incident) -> IncidentView {
    IncidentView::project(
        incident,
        state.machine.clock().now(),
        state.machine.timezone(),
    )
}

/// Handler for POST `/incidents`.
async fn handle_create_incident(
    AxumState(state): AxumState<AppState>,
    Json(req): Json<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<IncidentView>), HttpError> {
    info!(
        reporter_id = %req.reporter_id,
        priority = %req.priority,
        department = %req.department,
        "Handling create_incident request"
    );

    let intake: NewIncident = NewIncident {
        reporter_id: UserId::new(&req.reporter_id)?,
        branch: req.branch,
        department: req.department,
        priority: req.priority,
        short_description: req.short_description,
        full_message: req.full_message,
    };
    let incident: Incident = state.machine.create_incident(intake).await?;
    Ok((StatusCode::CREATED, Json(view(&state, &incident))))
}

/// Handler for POST `/incidents/{id}/problem_photo`.
async fn handle_problem_photo(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
    Json(req): Json<PhotoRequest>,
) -> Result<Json<IncidentView>, HttpError> {
    let incident_id: IncidentId = parse_incident_id(&raw_id)?;
    info!(incident_id = %incident_id, "Handling problem_photo request");

    let incident: Incident = state
        .machine
        .confirm_problem(&incident_id, PhotoRef::new(&req.photo_ref)?)
        .await?;
    Ok(Json(view(&state, &incident)))
}

/// Handler for POST `/incidents/{id}/resolution`.
async fn handle_resolution(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
    Json(req): Json<ResolutionRequest>,
) -> Result<Json<IncidentView>, HttpError> {
    let incident_id: IncidentId = parse_incident_id(&raw_id)?;
    info!(incident_id = %incident_id, caller_id = %req.caller_id, "Handling resolution request");

    let caller_id: UserId = UserId::new(&req.caller_id)?;
    let incident: Incident = state
        .machine
        .record_resolution(&incident_id, &caller_id, &req.text)?;
    Ok(Json(view(&state, &incident)))
}

/// Handler for POST `/incidents/{id}/solution_photo`.
async fn handle_solution_photo(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
    Json(req): Json<PhotoRequest>,
) -> Result<Json<IncidentView>, HttpError> {
    let incident_id: IncidentId = parse_incident_id(&raw_id)?;
    info!(incident_id = %incident_id, "Handling solution_photo request");

    let incident: Incident = state
        .machine
        .confirm_resolution(&incident_id, PhotoRef::new(&req.photo_ref)?)
        .await?;
    Ok(Json(view(&state, &incident)))
}

/// Handler for GET `/incidents/{id}`.
async fn handle_get_incident(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<IncidentView>, HttpError> {
    let incident_id: IncidentId = parse_incident_id(&raw_id)?;
    Ok(Json(state.machine.get_incident(&incident_id)?))
}

/// Handler for GET `/incidents/{id}/history`.
async fn handle_get_history(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<StatusChange>>, HttpError> {
    let incident_id: IncidentId = parse_incident_id(&raw_id)?;
    Ok(Json(state.machine.history(&incident_id)?))
}

/// Handler for GET `/responsibles/{id}/incidents`.
async fn handle_list_for_responsible(
    AxumState(state): AxumState<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<IncidentView>>, HttpError> {
    let responsible_id: UserId = UserId::new(&raw_id)?;
    Ok(Json(
        state.machine.list_active_for_responsible(&responsible_id)?,
    ))
}

/// Handler for GET `/scheduler/stats`.
async fn handle_scheduler_stats(AxumState(state): AxumState<AppState>) -> Json<StatsSnapshot> {
    Json(state.scheduler.stats())
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/incidents", post(handle_create_incident))
        .route("/incidents/{id}", get(handle_get_incident))
        .route("/incidents/{id}/history", get(handle_get_history))
        .route("/incidents/{id}/problem_photo", post(handle_problem_photo))
        .route("/incidents/{id}/resolution", post(handle_resolution))
        .route("/incidents/{id}/solution_photo", post(handle_solution_photo))
        .route(
            "/responsibles/{id}/incidents",
            get(handle_list_for_responsible),
        )
        .route("/scheduler/stats", get(handle_scheduler_stats))
        .route("/live", get(live_events_handler))
        .with_state(app_state)
}
