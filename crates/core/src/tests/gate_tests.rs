// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use async_trait::async_trait;
use incident_desk_domain::{Incident, Priority};
use incident_desk_persistence::{IncidentStore, Persistence};
use std::sync::Arc;
use std::time::Duration;

use super::helpers::{Harness, intake, photo, user};
use crate::{CoreError, DeadlineEstimator, EstimateError, EstimateRequest, IncidentStateMachine};

/// Yields once before answering, so concurrent intakes interleave.
struct YieldingEstimator;

#[async_trait]
impl DeadlineEstimator for YieldingEstimator {
    async fn estimate(
        &self,
        request: &EstimateRequest<'_>,
    ) -> Result<chrono::Duration, EstimateError> {
        tokio::task::yield_now().await;
        Err(EstimateError::Unavailable(format!(
            "no model for {}",
            request.priority
        )))
    }
}

fn yielding_machine(harness: &Harness) -> IncidentStateMachine {
    IncidentStateMachine::new(
        Arc::clone(&harness.store),
        harness.machine.clock().clone(),
        Arc::clone(harness.machine.dispatcher()),
        harness.machine.policy().clone(),
        super::helpers::test_config().directory(),
    )
    .with_estimator(Arc::new(YieldingEstimator), Duration::from_secs(5))
}

#[tokio::test]
async fn test_second_report_waits_for_problem_photo() {
    let harness: Harness = Harness::new();
    let first: Incident = harness
        .machine
        .create_incident(intake("reporter-1", Priority::High))
        .await
        .unwrap();

    let second = harness
        .machine
        .create_incident(intake("reporter-1", Priority::Low))
        .await;
    assert_eq!(
        second,
        Err(CoreError::PendingConfirmationExists(first.id.clone()))
    );
    assert_eq!(
        harness.machine.gate().pending(&user("reporter-1")).unwrap(),
        Some(first.id.clone())
    );

    harness
        .machine
        .confirm_problem(&first.id, photo("problem-1"))
        .await
        .unwrap();
    assert_eq!(harness.machine.gate().pending(&user("reporter-1")).unwrap(), None);

    let third: Incident = harness
        .machine
        .create_incident(intake("reporter-1", Priority::Low))
        .await
        .unwrap();
    assert_ne!(third.id, first.id);
}

#[tokio::test]
async fn test_other_reporters_are_not_blocked() {
    let harness: Harness = Harness::new();
    harness
        .machine
        .create_incident(intake("reporter-1", Priority::High))
        .await
        .unwrap();

    assert!(harness
        .machine
        .create_incident(intake("reporter-2", Priority::High))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_interleaved_reports_from_one_reporter_admit_exactly_one() {
    let harness: Harness = Harness::new();
    let machine: IncidentStateMachine = yielding_machine(&harness);

    let (a, b) = tokio::join!(
        machine.create_incident(intake("reporter-1", Priority::High)),
        machine.create_incident(intake("reporter-1", Priority::Medium)),
    );

    let (winner, loser) = match (a, b) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        other => panic!("expected exactly one admission, got {other:?}"),
    };
    assert_eq!(loser, CoreError::PendingConfirmationExists(winner.id.clone()));
    assert_eq!(harness.store.active_ids().unwrap(), vec![winner.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_reports_against_sqlite_admit_exactly_one() {
    let store: Arc<dyn IncidentStore> = Arc::new(Persistence::new_in_memory().unwrap());
    let harness: Harness = Harness::with_store(store);
    let machine: Arc<IncidentStateMachine> = Arc::new(yielding_machine(&harness));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let machine: Arc<IncidentStateMachine> = Arc::clone(&machine);
            tokio::spawn(async move {
                machine
                    .create_incident(intake("reporter-1", Priority::High))
                    .await
            })
        })
        .collect();

    let mut admitted: Vec<Incident> = Vec::new();
    let mut rejected: usize = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(incident) => admitted.push(incident),
            Err(CoreError::PendingConfirmationExists(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted.len(), 1);
    assert_eq!(rejected, 7);
    assert_eq!(
        harness.store.pending_for_reporter(&user("reporter-1")).unwrap(),
        Some(admitted[0].id.clone())
    );
}
