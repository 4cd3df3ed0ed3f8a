// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Deadline calculation for newly reported incidents.
//!
//! A deadline is `created_at + duration`, where the duration comes from an
//! external estimate when one is available and acceptable, and from the
//! per-priority base table otherwise.
//!
//! ## Invariants
//!
//! - Estimates are accepted only within `[min_estimate, base * max_factor]`
//! - Rejected or missing estimates fall back to the base duration
//! - Non-critical deadlines outside business hours move to the next opening
//! - Critical deadlines are never moved
//! - Clamping looks at the computed deadline, never at the creation time
//! - All wall-clock reasoning happens in the declared business timezone

use crate::error::DomainError;
use crate::types::Priority;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The daily operating window in the business timezone.
///
/// Both ends are inclusive: a deadline at exactly the closing time stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    timezone: Tz,
    opens_at: NaiveTime,
    closes_at: NaiveTime,
}

impl BusinessHours {
    /// Creates a business window.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBusinessHours` if the window does not open
    /// strictly before it closes.
    pub fn new(timezone: Tz, opens_at: NaiveTime, closes_at: NaiveTime) -> Result<Self, DomainError> {
        if opens_at >= closes_at {
            return Err(DomainError::InvalidBusinessHours {
                reason: format!("opening time {opens_at} must be before closing time {closes_at}"),
            });
        }
        Ok(Self {
            timezone,
            opens_at,
            closes_at,
        })
    }

    /// Creates a business window from textual configuration values.
    ///
    /// # Arguments
    ///
    /// * `timezone` - IANA timezone name (e.g. `Asia/Tashkent`)
    /// * `opens_at` - Opening time as `HH:MM`
    /// * `closes_at` - Closing time as `HH:MM`
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is unknown, a time does not parse, or
    /// the window is empty.
    pub fn parse(timezone: &str, opens_at: &str, closes_at: &str) -> Result<Self, DomainError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| DomainError::InvalidTimezone(timezone.to_string()))?;
        let parse_time = |value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
                DomainError::InvalidBusinessHours {
                    reason: format!("'{value}' is not a valid HH:MM time"),
                }
            })
        };
        Self::new(tz, parse_time(opens_at)?, parse_time(closes_at)?)
    }

    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    #[must_use]
    pub const fn opens_at(&self) -> NaiveTime {
        self.opens_at
    }

    #[must_use]
    pub const fn closes_at(&self) -> NaiveTime {
        self.closes_at
    }

    /// Returns the calendar date of `instant` in the business timezone.
    #[must_use]
    pub fn business_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Returns true if `instant` falls within the operating window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let local_time: NaiveTime = instant.with_timezone(&self.timezone).time();
        local_time >= self.opens_at && local_time <= self.closes_at
    }

    /// Returns the first opening time strictly after `instant`'s position
    /// outside the window.
    ///
    /// Before opening this is the same day's opening; after closing it is the
    /// next day's.
    ///
    /// # Errors
    ///
    /// Returns an error if the date cannot be advanced or the opening time
    /// cannot be resolved in the timezone.
    pub fn next_opening(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        let local = instant.with_timezone(&self.timezone);
        let date: NaiveDate = if local.time() < self.opens_at {
            local.date_naive()
        } else {
            local
                .date_naive()
                .succ_opt()
                .ok_or_else(|| DomainError::DateArithmeticOverflow {
                    operation: format!("advancing past {}", local.date_naive()),
                })?
        };
        self.resolve_local(date.and_time(self.opens_at))
    }

    /// Moves `instant` to the next opening if it lies outside the window.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::next_opening`].
    pub fn clamp(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        if self.contains(instant) {
            Ok(instant)
        } else {
            self.next_opening(instant)
        }
    }

    /// Converts a wall-clock time in the business timezone to UTC.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant; a time
    /// inside a DST gap resolves one hour later.
    fn resolve_local(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>, DomainError> {
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| DomainError::InvalidBusinessHours {
                reason: format!(
                    "could not resolve {naive} in timezone {}",
                    self.timezone.name()
                ),
            })
    }
}

/// Base resolution time per priority, used when no acceptable estimate exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityDurations {
    pub critical: Duration,
    pub high: Duration,
    pub medium: Duration,
    pub low: Duration,
}

impl PriorityDurations {
    #[must_use]
    pub const fn for_priority(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    /// # Errors
    ///
    /// Returns `DomainError::InvalidDuration` for the first non-positive entry.
    pub fn validate(&self) -> Result<(), DomainError> {
        for priority in Priority::ALL {
            if self.for_priority(priority) <= Duration::zero() {
                return Err(DomainError::InvalidDuration {
                    field: format!("base duration for {priority}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for PriorityDurations {
    fn default() -> Self {
        Self {
            critical: Duration::hours(1),
            high: Duration::hours(4),
            medium: Duration::hours(24),
            low: Duration::hours(72),
        }
    }
}

/// Acceptable range for externally estimated durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateBounds {
    /// Shortest duration an estimate may produce.
    pub min_estimate: Duration,
    /// Longest estimate as a multiple of the priority's base duration.
    pub max_factor: i32,
}

impl Default for EstimateBounds {
    fn default() -> Self {
        Self {
            min_estimate: Duration::minutes(15),
            max_factor: 3,
        }
    }
}

/// Where the duration behind a deadline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// The estimate was within bounds and used as is.
    Estimate,
    /// No estimate was available; the base duration was used.
    BaseTable,
    /// The estimate was out of bounds; the base duration was used.
    RejectedEstimate,
}

/// Outcome of a deadline calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineDecision {
    /// The authoritative deadline.
    pub deadline: DateTime<Utc>,
    /// `created_at + duration` before business-hours clamping.
    pub raw_deadline: DateTime<Utc>,
    pub duration: Duration,
    pub source: DurationSource,
}

impl DeadlineDecision {
    /// Returns true if business hours moved the deadline.
    #[must_use]
    pub fn was_moved_to_business_hours(&self) -> bool {
        self.deadline != self.raw_deadline
    }
}

/// Computes incident deadlines from priority, estimate, and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlinePolicy {
    hours: BusinessHours,
    base: PriorityDurations,
    bounds: EstimateBounds,
}

impl DeadlinePolicy {
    /// # Errors
    ///
    /// Returns an error if a base duration or the estimate bounds are not
    /// positive.
    pub fn new(
        hours: BusinessHours,
        base: PriorityDurations,
        bounds: EstimateBounds,
    ) -> Result<Self, DomainError> {
        base.validate()?;
        if bounds.min_estimate <= Duration::zero() {
            return Err(DomainError::InvalidDuration {
                field: String::from("min_estimate"),
            });
        }
        if bounds.max_factor <= 0 {
            return Err(DomainError::InvalidDuration {
                field: String::from("max_factor"),
            });
        }
        Ok(Self {
            hours,
            base,
            bounds,
        })
    }

    #[must_use]
    pub const fn business_hours(&self) -> &BusinessHours {
        &self.hours
    }

    #[must_use]
    pub const fn base_duration(&self, priority: Priority) -> Duration {
        self.base.for_priority(priority)
    }

    /// Returns true if `estimate` may replace the base duration for `priority`.
    #[must_use]
    pub fn accepts_estimate(&self, priority: Priority, estimate: Duration) -> bool {
        let ceiling: Duration = self.base_duration(priority) * self.bounds.max_factor;
        estimate >= self.bounds.min_estimate && estimate <= ceiling
    }

    /// Computes the deadline for an incident created at `created_at`.
    ///
    /// # Arguments
    ///
    /// * `priority` - The incident priority
    /// * `estimate` - Duration proposed by the estimation service, if any
    /// * `created_at` - Creation instant
    ///
    /// # Errors
    ///
    /// Returns an error on date overflow or if the next opening cannot be
    /// resolved in the business timezone.
    pub fn compute(
        &self,
        priority: Priority,
        estimate: Option<Duration>,
        created_at: DateTime<Utc>,
    ) -> Result<DeadlineDecision, DomainError> {
        let (duration, source) = match estimate {
            Some(proposed) if self.accepts_estimate(priority, proposed) => {
                (proposed, DurationSource::Estimate)
            }
            Some(_) => (self.base_duration(priority), DurationSource::RejectedEstimate),
            None => (self.base_duration(priority), DurationSource::BaseTable),
        };

        let raw_deadline: DateTime<Utc> = created_at.checked_add_signed(duration).ok_or_else(|| {
            DomainError::DateArithmeticOverflow {
                operation: format!("adding {duration} to {created_at}"),
            }
        })?;

        let deadline: DateTime<Utc> = if priority.is_exempt_from_business_hours() {
            raw_deadline
        } else {
            self.hours.clamp(raw_deadline)?
        };

        Ok(DeadlineDecision {
            deadline,
            raw_deadline,
            duration,
            source,
        })
    }
}
