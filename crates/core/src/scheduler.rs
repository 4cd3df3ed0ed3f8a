// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The reminder scheduler.
//!
//! One background task scans the active index on a fixed interval. For every
//! `Open` incident it either marks it overdue or sends the reminders whose
//! thresholds have been crossed. Each reminder is recorded in the store before
//! it is sent, so a restart can lose a reminder but never repeat one.
//!
//! Ticks never overlap: a tick that overruns delays the next one.

use chrono::{DateTime, Utc};
use incident_desk_domain::{Incident, IncidentId, IncidentStatus};
use incident_desk_persistence::{IncidentStore, ReminderClaim};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::CoreError;
use crate::machine::{IncidentStateMachine, OverdueOutcome};
use crate::notifier::ReminderNotice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Minutes-before-deadline values, checked in this order.
    pub thresholds: Vec<u32>,
    pub tick_interval: Duration,
    /// How long resolved incidents are kept.
    pub retention: chrono::Duration,
    /// Consecutive failing ticks before a warning is logged.
    pub failing_tick_warn_threshold: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

impl SchedulerSettings {
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            thresholds: config.reminder_thresholds.clone(),
            tick_interval: config.tick_interval(),
            retention: config.retention(),
            failing_tick_warn_threshold: config.failing_tick_warn_threshold,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Ids read from the active index.
    pub scanned: usize,
    pub reminders_sent: usize,
    pub marked_overdue: usize,
    /// Ids dropped from the active index because they were resolved or gone.
    pub evicted: usize,
    /// Resolved incidents deleted by retention.
    pub purged: usize,
    pub errors: usize,
}

impl TickReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Cumulative scheduler counters.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    errors: AtomicU64,
    consecutive_failing_ticks: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub errors: u64,
    pub consecutive_failing_ticks: u64,
}

impl SchedulerStats {
    fn record(&self, report: &TickReport, warn_threshold: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if report.is_clean() {
            self.consecutive_failing_ticks.store(0, Ordering::Relaxed);
            return;
        }

        self.errors.fetch_add(
            u64::try_from(report.errors).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        let failing: u64 = self
            .consecutive_failing_ticks
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        if warn_threshold > 0 && failing % warn_threshold == 0 {
            warn!(
                consecutive_failing_ticks = failing,
                total_errors = self.errors.load(Ordering::Relaxed),
                "Reminder scheduler keeps failing"
            );
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            consecutive_failing_ticks: self.consecutive_failing_ticks.load(Ordering::Relaxed),
        }
    }
}

/// What processing one active id amounted to.
enum Outcome {
    Idle,
    Reminded(usize),
    MarkedOverdue,
    Evicted,
}

#[derive(Debug)]
pub struct ReminderScheduler {
    machine: Arc<IncidentStateMachine>,
    settings: SchedulerSettings,
    stats: SchedulerStats,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(machine: Arc<IncidentStateMachine>, settings: SchedulerSettings) -> Self {
        Self {
            machine,
            settings,
            stats: SchedulerStats::default(),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs ticks until `cancel` fires.
    ///
    /// The first tick runs immediately. Cancellation is only observed between
    /// ticks, so a tick in progress always completes.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval: tokio::time::Interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.settings.tick_interval.as_secs(),
            thresholds = ?self.settings.thresholds,
            "Reminder scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(ticks = self.stats.snapshot().ticks, "Reminder scheduler stopped");
    }

    /// Performs one scan of the active index followed by retention
    /// housekeeping.
    ///
    /// Errors are counted in the report; one failing incident does not stop
    /// the others from being processed.
    pub async fn tick(&self) -> TickReport {
        let now: DateTime<Utc> = self.machine.clock().now();
        let mut report: TickReport = TickReport::default();

        match self.store().active_ids() {
            Ok(ids) => {
                for incident_id in ids {
                    report.scanned += 1;
                    match self.process(&incident_id, now).await {
                        Ok(Outcome::Idle) => {}
                        Ok(Outcome::Reminded(count)) => report.reminders_sent += count,
                        Ok(Outcome::MarkedOverdue) => report.marked_overdue += 1,
                        Ok(Outcome::Evicted) => report.evicted += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(incident_id = %incident_id, error = %e, "Reminder check failed");
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                error!(error = %e, "Cannot read the active incident index");
            }
        }

        self.purge(now, &mut report);
        self.stats
            .record(&report, self.settings.failing_tick_warn_threshold);
        debug!(?report, "Tick finished");
        report
    }

    async fn process(&self, incident_id: &IncidentId, now: DateTime<Utc>) -> Result<Outcome, CoreError> {
        let Some(mut incident) = self.store().get(incident_id)? else {
            self.store().evict_active(incident_id)?;
            warn!(incident_id = %incident_id, "Evicted unknown id from the active index");
            return Ok(Outcome::Evicted);
        };

        match incident.status {
            IncidentStatus::Resolved => {
                self.store().evict_active(incident_id)?;
                warn!(incident_id = %incident_id, "Evicted resolved incident from the active index");
                Ok(Outcome::Evicted)
            }
            IncidentStatus::Open => {
                if incident.time_left(now) <= chrono::Duration::zero() {
                    return match self.machine.mark_overdue(incident_id).await? {
                        OverdueOutcome::Marked(_) => Ok(Outcome::MarkedOverdue),
                        OverdueOutcome::AlreadyOverdue => Ok(Outcome::Idle),
                    };
                }
                let sent: usize = self.send_reminders(&mut incident, now).await?;
                Ok(if sent == 0 {
                    Outcome::Idle
                } else {
                    Outcome::Reminded(sent)
                })
            }
            IncidentStatus::Created
            | IncidentStatus::Overdue
            | IncidentStatus::PendingResolutionPhoto => Ok(Outcome::Idle),
        }
    }

    async fn send_reminders(
        &self,
        incident: &mut Incident,
        now: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        let time_left: chrono::Duration = incident.time_left(now);
        let mut sent: usize = 0;

        for &threshold in &self.settings.thresholds {
            if incident.reminders_sent.contains(&threshold)
                || time_left > chrono::Duration::minutes(i64::from(threshold))
            {
                continue;
            }
            match self
                .store()
                .record_reminder(&incident.id, threshold, IncidentStatus::Open, now)?
            {
                ReminderClaim::Claimed => {
                    incident.reminders_sent.insert(threshold);
                }
                ReminderClaim::AlreadySent => {
                    // Another scheduler instance claimed it first.
                    incident.reminders_sent.insert(threshold);
                    continue;
                }
                ReminderClaim::StatusChanged(current) => {
                    debug!(
                        incident_id = %incident.id,
                        status = %current,
                        "Incident left Open during reminders, stopping"
                    );
                    break;
                }
                ReminderClaim::Missing => break,
            }

            let notice = ReminderNotice {
                threshold_minutes: threshold,
                minutes_left: time_left.num_minutes(),
            };
            info!(
                incident_id = %incident.id,
                threshold_minutes = threshold,
                minutes_left = notice.minutes_left,
                "Sending deadline reminder"
            );
            self.machine.dispatcher().reminder(incident, notice).await;
            sent += 1;
        }

        Ok(sent)
    }

    fn purge(&self, now: DateTime<Utc>, report: &mut TickReport) {
        let Some(cutoff) = now.checked_sub_signed(self.settings.retention) else {
            return;
        };
        match self.store().purge_resolved_before(cutoff) {
            Ok(0) => {}
            Ok(purged) => {
                report.purged = purged;
                info!(purged, cutoff = %cutoff, "Purged resolved incidents past retention");
            }
            Err(e) => {
                report.errors += 1;
                warn!(error = %e, "Retention purge failed");
            }
        }
    }

    fn store(&self) -> &Arc<dyn IncidentStore> {
        self.machine.store()
    }
}
