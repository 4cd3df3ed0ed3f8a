// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use chrono::{Duration, NaiveDate};
use incident_desk_domain::{IncidentId, IncidentStatus, PhotoRef, StatusChange};

use super::{base_time, business_date, created_incident, stores, user};
use crate::{
    CasOutcome, IncidentStore, PersistenceError, ReminderClaim, SlotClaim, Transition,
    TransitionChanges,
};

fn open(store: &dyn IncidentStore, id: &IncidentId) {
    let transition: Transition = Transition::new(
        id.clone(),
        IncidentStatus::Created,
        IncidentStatus::Open,
        base_time() + Duration::minutes(1),
    )
    .by(user("100"))
    .with_changes(TransitionChanges {
        problem_photo: Some(PhotoRef::new("photo-problem").unwrap()),
        ..TransitionChanges::default()
    });
    assert!(matches!(
        store.apply_transition(&transition).unwrap(),
        CasOutcome::Applied(_)
    ));
}

#[test]
fn test_daily_sequence_increments_per_date() {
    for (name, store) in stores() {
        let other_day: NaiveDate = business_date().succ_opt().unwrap();
        assert_eq!(store.next_daily_sequence(business_date()).unwrap(), 1, "{name}");
        assert_eq!(store.next_daily_sequence(business_date()).unwrap(), 2, "{name}");
        assert_eq!(store.next_daily_sequence(other_day).unwrap(), 1, "{name}");
        assert_eq!(store.next_daily_sequence(business_date()).unwrap(), 3, "{name}");
    }
}

#[test]
fn test_insert_pending_claims_slot_and_indexes() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        assert_eq!(store.insert_pending(&incident).unwrap(), SlotClaim::Claimed, "{name}");

        assert_eq!(store.get(&incident.id).unwrap(), Some(incident.clone()), "{name}");
        assert_eq!(
            store.pending_for_reporter(&user("100")).unwrap(),
            Some(incident.id.clone()),
            "{name}"
        );
        assert_eq!(store.active_ids().unwrap(), vec![incident.id.clone()], "{name}");

        let history: Vec<StatusChange> = store.history(&incident.id).unwrap();
        assert_eq!(history.len(), 1, "{name}");
        assert_eq!(history[0].previous_status, None, "{name}");
        assert_eq!(history[0].new_status, IncidentStatus::Created, "{name}");
    }
}

#[test]
fn test_second_pending_incident_for_reporter_is_refused() {
    for (name, store) in stores() {
        let first = created_incident(1, "100");
        let second = created_incident(2, "100");
        store.insert_pending(&first).unwrap();

        assert_eq!(
            store.insert_pending(&second).unwrap(),
            SlotClaim::Occupied(first.id.clone()),
            "{name}"
        );
        assert_eq!(store.get(&second.id).unwrap(), None, "{name}");
        assert_eq!(store.active_ids().unwrap().len(), 1, "{name}");
    }
}

#[test]
fn test_duplicate_incident_id_is_a_constraint_violation() {
    for (name, store) in stores() {
        store.insert_pending(&created_incident(1, "100")).unwrap();

        let err: PersistenceError = store
            .insert_pending(&created_incident(1, "101"))
            .unwrap_err();
        assert!(
            matches!(err, PersistenceError::ConstraintViolation(_)),
            "{name}: {err}"
        );
        assert!(!err.is_unavailable(), "{name}");
        assert_eq!(store.pending_for_reporter(&user("101")).unwrap(), None, "{name}");
    }
}

#[test]
fn test_other_reporters_are_not_blocked() {
    for (name, store) in stores() {
        store.insert_pending(&created_incident(1, "100")).unwrap();
        assert_eq!(
            store.insert_pending(&created_incident(2, "101")).unwrap(),
            SlotClaim::Claimed,
            "{name}"
        );
    }
}

#[test]
fn test_confirming_releases_pending_slot() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();
        open(store.as_ref(), &incident.id);

        assert_eq!(store.pending_for_reporter(&user("100")).unwrap(), None, "{name}");
        let stored = store.get(&incident.id).unwrap().unwrap();
        assert_eq!(stored.status, IncidentStatus::Open, "{name}");
        assert!(stored.has_problem_photo, "{name}");
        assert_eq!(
            stored.problem_photo,
            Some(PhotoRef::new("photo-problem").unwrap()),
            "{name}"
        );

        assert_eq!(
            store.insert_pending(&created_incident(2, "100")).unwrap(),
            SlotClaim::Claimed,
            "{name}"
        );
    }
}

#[test]
fn test_transition_with_stale_status_is_rejected() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();

        let stale: Transition = Transition::new(
            incident.id.clone(),
            IncidentStatus::Open,
            IncidentStatus::Overdue,
            base_time(),
        );
        assert_eq!(
            store.apply_transition(&stale).unwrap(),
            CasOutcome::StatusMismatch(IncidentStatus::Created),
            "{name}"
        );
        assert_eq!(store.history(&incident.id).unwrap().len(), 1, "{name}");
    }
}

#[test]
fn test_transition_on_unknown_incident_reports_missing() {
    for (name, store) in stores() {
        let transition: Transition = Transition::new(
            IncidentId::from_parts(business_date(), 99),
            IncidentStatus::Created,
            IncidentStatus::Open,
            base_time(),
        );
        assert_eq!(
            store.apply_transition(&transition).unwrap(),
            CasOutcome::Missing,
            "{name}"
        );
    }
}

#[test]
fn test_resolution_evicts_from_active_index() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();
        open(store.as_ref(), &incident.id);

        let record = Transition::new(
            incident.id.clone(),
            IncidentStatus::Open,
            IncidentStatus::PendingResolutionPhoto,
            base_time() + Duration::hours(1),
        )
        .by(user("900"))
        .with_changes(TransitionChanges {
            resolution: Some(String::from("Supplier re-delivered")),
            resolver_id: Some(user("900")),
            ..TransitionChanges::default()
        });
        store.apply_transition(&record).unwrap();
        assert_eq!(store.active_ids().unwrap().len(), 1, "{name}");

        let resolved_at = base_time() + Duration::hours(2);
        let confirm = Transition::new(
            incident.id.clone(),
            IncidentStatus::PendingResolutionPhoto,
            IncidentStatus::Resolved,
            resolved_at,
        )
        .by(user("900"))
        .with_changes(TransitionChanges {
            solution_photo: Some(PhotoRef::new("photo-solution").unwrap()),
            resolved_at: Some(resolved_at),
            ..TransitionChanges::default()
        });

        let CasOutcome::Applied(resolved) = store.apply_transition(&confirm).unwrap() else {
            panic!("{name}: resolution not applied");
        };
        assert_eq!(resolved.status, IncidentStatus::Resolved, "{name}");
        assert_eq!(resolved.resolution.as_deref(), Some("Supplier re-delivered"), "{name}");
        assert_eq!(resolved.resolver_id, Some(user("900")), "{name}");
        assert!(resolved.has_solution_photo, "{name}");
        assert_eq!(resolved.resolved_at, Some(resolved_at), "{name}");
        assert!(store.active_ids().unwrap().is_empty(), "{name}");

        let statuses: Vec<IncidentStatus> = store
            .history(&incident.id)
            .unwrap()
            .into_iter()
            .map(|entry| entry.new_status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                IncidentStatus::Created,
                IncidentStatus::Open,
                IncidentStatus::PendingResolutionPhoto,
                IncidentStatus::Resolved,
            ],
            "{name}"
        );
    }
}

#[test]
fn test_reminder_recorded_at_most_once() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();
        open(store.as_ref(), &incident.id);

        let claim = |threshold: u32| {
            store
                .record_reminder(&incident.id, threshold, IncidentStatus::Open, base_time())
                .unwrap()
        };
        assert_eq!(claim(60), ReminderClaim::Claimed, "{name}");
        assert_eq!(claim(60), ReminderClaim::AlreadySent, "{name}");
        assert_eq!(claim(30), ReminderClaim::Claimed, "{name}");

        let stored = store.get(&incident.id).unwrap().unwrap();
        assert_eq!(
            stored.reminders_sent.into_iter().collect::<Vec<u32>>(),
            vec![30, 60],
            "{name}"
        );
    }
}

#[test]
fn test_reminder_not_claimed_once_incident_leaves_expected_status() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();
        open(store.as_ref(), &incident.id);
        store
            .apply_transition(
                &Transition::new(
                    incident.id.clone(),
                    IncidentStatus::Open,
                    IncidentStatus::PendingResolutionPhoto,
                    base_time() + Duration::hours(1),
                )
                .by(user("900")),
            )
            .unwrap();

        assert_eq!(
            store
                .record_reminder(&incident.id, 30, IncidentStatus::Open, base_time())
                .unwrap(),
            ReminderClaim::StatusChanged(IncidentStatus::PendingResolutionPhoto),
            "{name}"
        );
        let stored = store.get(&incident.id).unwrap().unwrap();
        assert!(stored.reminders_sent.is_empty(), "{name}");
    }
}

#[test]
fn test_reminder_for_unknown_incident_reports_missing() {
    for (name, store) in stores() {
        let unknown = IncidentId::from_parts(business_date(), 7);
        assert_eq!(
            store
                .record_reminder(&unknown, 60, IncidentStatus::Open, base_time())
                .unwrap(),
            ReminderClaim::Missing,
            "{name}"
        );
    }
}

#[test]
fn test_evict_active_reports_presence() {
    for (name, store) in stores() {
        let incident = created_incident(1, "100");
        store.insert_pending(&incident).unwrap();

        assert!(store.evict_active(&incident.id).unwrap(), "{name}");
        assert!(!store.evict_active(&incident.id).unwrap(), "{name}");
        assert!(store.get(&incident.id).unwrap().is_some(), "{name}");
    }
}

#[test]
fn test_list_active_for_responsible_filters_by_assignee() {
    for (name, store) in stores() {
        let mine = created_incident(1, "100");
        let mut theirs = created_incident(2, "101");
        theirs.responsible_id = user("901");
        store.insert_pending(&mine).unwrap();
        store.insert_pending(&theirs).unwrap();

        let listed = store.list_active_for_responsible(&user("900")).unwrap();
        assert_eq!(listed.len(), 1, "{name}");
        assert_eq!(listed[0].id, mine.id, "{name}");
        assert!(store.list_active_for_responsible(&user("999")).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn test_purge_removes_only_old_resolved_incidents() {
    for (name, store) in stores() {
        let old = created_incident(1, "100");
        let recent = created_incident(2, "101");
        let open_one = created_incident(3, "102");
        for incident in [&old, &recent, &open_one] {
            store.insert_pending(incident).unwrap();
            open(store.as_ref(), &incident.id);
        }

        for (incident, resolved_at) in [
            (&old, base_time() + Duration::days(1)),
            (&recent, base_time() + Duration::days(20)),
        ] {
            store
                .apply_transition(&Transition::new(
                    incident.id.clone(),
                    IncidentStatus::Open,
                    IncidentStatus::PendingResolutionPhoto,
                    resolved_at,
                ))
                .unwrap();
            assert_eq!(
                store
                    .record_reminder(
                        &incident.id,
                        60,
                        IncidentStatus::PendingResolutionPhoto,
                        resolved_at,
                    )
                    .unwrap(),
                ReminderClaim::Claimed,
                "{name}"
            );
            store
                .apply_transition(
                    &Transition::new(
                        incident.id.clone(),
                        IncidentStatus::PendingResolutionPhoto,
                        IncidentStatus::Resolved,
                        resolved_at,
                    )
                    .with_changes(TransitionChanges {
                        resolved_at: Some(resolved_at),
                        ..TransitionChanges::default()
                    }),
                )
                .unwrap();
        }

        let cutoff = base_time() + Duration::days(10);
        assert_eq!(store.purge_resolved_before(cutoff).unwrap(), 1, "{name}");
        assert_eq!(store.get(&old.id).unwrap(), None, "{name}");
        assert!(store.history(&old.id).unwrap().is_empty(), "{name}");
        assert!(store.get(&recent.id).unwrap().is_some(), "{name}");
        assert!(store.get(&open_one.id).unwrap().is_some(), "{name}");

        assert_eq!(store.purge_resolved_before(cutoff).unwrap(), 0, "{name}");
    }
}
