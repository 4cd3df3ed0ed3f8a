// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Service configuration.
//!
//! Every field has a default, so a configuration file only needs to name what
//! it changes. The department directory has no default: a deployment must
//! assign a responsible person to every department before it validates.

use chrono::Duration;
use incident_desk_domain::{
    BusinessHours, DeadlinePolicy, Department, DepartmentDirectory, DomainError, EstimateBounds,
    PriorityDurations, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Base resolution time per priority, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseMinutes {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl Default for BaseMinutes {
    fn default() -> Self {
        Self {
            critical: 60,
            high: 4 * 60,
            medium: 24 * 60,
            low: 72 * 60,
        }
    }
}

impl BaseMinutes {
    fn to_durations(self) -> PriorityDurations {
        PriorityDurations {
            critical: Duration::minutes(self.critical),
            high: Duration::minutes(self.high),
            medium: Duration::minutes(self.medium),
            low: Duration::minutes(self.low),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// IANA name of the business timezone.
    pub timezone: String,
    /// Opening time of the business window, `HH:MM`.
    pub business_opens_at: String,
    /// Closing time of the business window, `HH:MM`.
    pub business_closes_at: String,
    pub base_minutes: BaseMinutes,
    pub min_estimate_minutes: i64,
    pub max_estimate_factor: i32,
    /// Minutes-before-deadline values, evaluated in the order given.
    pub reminder_thresholds: Vec<u32>,
    pub tick_interval_secs: u64,
    pub notify_timeout_secs: u64,
    pub estimate_timeout_secs: u64,
    /// Days a resolved incident is kept before it is purged.
    pub retention_days: i64,
    /// Consecutive failing ticks before the scheduler warns.
    pub failing_tick_warn_threshold: u64,
    pub responsibles: BTreeMap<Department, UserId>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timezone: String::from("Asia/Tashkent"),
            business_opens_at: String::from("08:00"),
            business_closes_at: String::from("23:00"),
            base_minutes: BaseMinutes::default(),
            min_estimate_minutes: 15,
            max_estimate_factor: 3,
            reminder_thresholds: vec![60, 30, 10],
            tick_interval_secs: 60,
            notify_timeout_secs: 10,
            estimate_timeout_secs: 10,
            retention_days: 30,
            failing_tick_warn_threshold: 5,
            responsibles: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Checks the configuration as a whole.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an unknown timezone, an empty or
    /// inverted business window, a non-positive duration, a zero or repeated
    /// reminder threshold, or a department without a responsible person.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.deadline_policy()?;

        let positive_secs: [(&str, u64); 3] = [
            ("tick_interval_secs", self.tick_interval_secs),
            ("notify_timeout_secs", self.notify_timeout_secs),
            ("estimate_timeout_secs", self.estimate_timeout_secs),
        ];
        for (field, value) in positive_secs {
            if value == 0 {
                return Err(invalid(field));
            }
        }
        if self.retention_days <= 0 {
            return Err(invalid("retention_days"));
        }
        if self.failing_tick_warn_threshold == 0 {
            return Err(invalid("failing_tick_warn_threshold"));
        }

        let mut seen: BTreeSet<u32> = BTreeSet::new();
        for threshold in &self.reminder_thresholds {
            if *threshold == 0 || !seen.insert(*threshold) {
                return Err(DomainError::InvalidReminderThreshold(*threshold));
            }
        }

        self.directory().validate_complete()
    }

    /// Builds the deadline policy described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone, window or durations are invalid.
    pub fn deadline_policy(&self) -> Result<DeadlinePolicy, DomainError> {
        let hours: BusinessHours = BusinessHours::parse(
            &self.timezone,
            &self.business_opens_at,
            &self.business_closes_at,
        )?;
        let bounds = EstimateBounds {
            min_estimate: Duration::minutes(self.min_estimate_minutes),
            max_factor: self.max_estimate_factor,
        };
        DeadlinePolicy::new(hours, self.base_minutes.to_durations(), bounds)
    }

    #[must_use]
    pub fn directory(&self) -> DepartmentDirectory {
        DepartmentDirectory::new(self.responsibles.clone())
    }

    #[must_use]
    pub const fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub const fn notify_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notify_timeout_secs)
    }

    #[must_use]
    pub const fn estimate_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.estimate_timeout_secs)
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days)
    }
}

fn invalid(field: &str) -> DomainError {
    DomainError::InvalidDuration {
        field: field.to_string(),
    }
}
