// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{
    Branch, Department, DomainError, Incident, IncidentId, IncidentStatus, IncidentView,
    NewIncident, Priority, UserId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Tashkent;

fn intake() -> NewIncident {
    NewIncident {
        reporter_id: UserId::new("555").unwrap(),
        branch: Branch::Novza,
        department: Department::It,
        priority: Priority::High,
        short_description: String::from("POS terminal offline"),
        full_message: String::from("The POS terminal at the front register is offline."),
    }
}

fn incident(created_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Incident {
    Incident::created(
        IncidentId::from_parts(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(), 1),
        intake(),
        deadline,
        UserId::new("1001").unwrap(),
        created_at,
    )
}

#[test]
fn test_new_incident_requires_text() {
    assert!(intake().validate().is_ok());

    let mut blank: NewIncident = intake();
    blank.short_description = String::from("   ");
    assert_eq!(
        blank.validate(),
        Err(DomainError::EmptyText {
            field: "short_description"
        })
    );

    let mut blank: NewIncident = intake();
    blank.full_message = String::new();
    assert_eq!(
        blank.validate(),
        Err(DomainError::EmptyText {
            field: "full_message"
        })
    );
}

#[test]
fn test_created_incident_starts_clean() {
    let created_at: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
    let record: Incident = incident(created_at, created_at + Duration::hours(4));

    assert_eq!(record.status, IncidentStatus::Created);
    assert!(!record.has_problem_photo);
    assert!(!record.has_solution_photo);
    assert!(record.reminders_sent.is_empty());
    assert!(record.resolution.is_none());
    assert!(record.resolved_at.is_none());
}

#[test]
fn test_view_renders_business_timezone_and_time_left() {
    let created_at: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
    let record: Incident = incident(created_at, created_at + Duration::hours(4));

    let view: IncidentView =
        IncidentView::project(&record, created_at + Duration::minutes(90), Tashkent);

    assert_eq!(view.deadline, "2026-10-16T14:00:00+05:00");
    assert_eq!(view.created_at, "2026-10-16T10:00:00+05:00");
    assert_eq!(view.minutes_left, 150);
    assert!(!view.is_past_deadline);
}

#[test]
fn test_view_flags_past_deadline() {
    let created_at: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
    let record: Incident = incident(created_at, created_at + Duration::hours(1));

    let view: IncidentView =
        IncidentView::project(&record, created_at + Duration::hours(2), Tashkent);

    assert_eq!(view.minutes_left, -60);
    assert!(view.is_past_deadline);
}

#[test]
fn test_view_serializes_without_empty_resolution_fields() {
    let created_at: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
    let record: Incident = incident(created_at, created_at + Duration::hours(1));
    let view: IncidentView = IncidentView::project(&record, created_at, Tashkent);

    let json: serde_json::Value = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "created");
    assert_eq!(json["priority"], "high");
    assert!(json.get("resolution").is_none());
    assert!(json.get("resolved_at").is_none());
}
