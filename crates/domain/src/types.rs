// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Urgency tier assigned to an incident at intake.
///
/// Ordering follows urgency: `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All tiers, most urgent first.
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Returns the string representation used for persistence and the API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Returns true if deadlines for this tier ignore business hours.
    #[must_use]
    pub const fn is_exempt_from_business_hours(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(DomainError::InvalidPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restaurant branch from the fixed branch catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Sergeli,
    Novza,
    BuyukIpakYoli,
    Chilonzor,
    Bodomzor,
}

impl Branch {
    /// The complete branch catalog.
    pub const ALL: [Self; 5] = [
        Self::Sergeli,
        Self::Novza,
        Self::BuyukIpakYoli,
        Self::Chilonzor,
        Self::Bodomzor,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sergeli => "sergeli",
            Self::Novza => "novza",
            Self::BuyukIpakYoli => "buyuk_ipak_yoli",
            Self::Chilonzor => "chilonzor",
            Self::Bodomzor => "bodomzor",
        }
    }
}

impl FromStr for Branch {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|branch| branch.as_str() == s)
            .ok_or_else(|| DomainError::UnknownBranch(s.to_string()))
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Department that owns the resolution of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Hr,
    Marketing,
    Accounting,
    It,
    Procurement,
    QualityControl,
    StandardsAndService,
    DeliveryAndCallCenter,
    HeadOffice,
}

impl Department {
    /// The complete department catalog.
    pub const ALL: [Self; 9] = [
        Self::Hr,
        Self::Marketing,
        Self::Accounting,
        Self::It,
        Self::Procurement,
        Self::QualityControl,
        Self::StandardsAndService,
        Self::DeliveryAndCallCenter,
        Self::HeadOffice,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::Marketing => "marketing",
            Self::Accounting => "accounting",
            Self::It => "it",
            Self::Procurement => "procurement",
            Self::QualityControl => "quality_control",
            Self::StandardsAndService => "standards_and_service",
            Self::DeliveryAndCallCenter => "delivery_and_call_center",
            Self::HeadOffice => "head_office",
        }
    }
}

impl FromStr for Department {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|department| department.as_str() == s)
            .ok_or_else(|| DomainError::UnknownDepartment(s.to_string()))
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External user identifier (chat platform user id).
///
/// Used both for reporters and for responsible persons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a user id, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUserId` if the value is empty or contains
    /// whitespace.
    pub fn new(value: &str) -> Result<Self, DomainError> {
        let trimmed: &str = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidUserId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incident identifier in the form `#YYYYMMDD-NNN`.
///
/// The date is the business date of creation; `NNN` is the daily sequence
/// number, zero-padded to at least three digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IncidentId(String);

impl IncidentId {
    /// Builds an identifier from a business date and a daily sequence number.
    #[must_use]
    pub fn from_parts(date: NaiveDate, sequence: u32) -> Self {
        Self(format!(
            "#{:04}{:02}{:02}-{sequence:03}",
            date.year(),
            date.month(),
            date.day()
        ))
    }

    /// Parses and validates an identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidIncidentId` if the format is wrong or the
    /// embedded date does not exist.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidIncidentId(value.to_string());

        let body: &str = value.strip_prefix('#').ok_or_else(invalid)?;
        let (date_part, sequence_part) = body.split_once('-').ok_or_else(invalid)?;

        if date_part.len() != 8 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence_part.len() < 3 || !sequence_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| invalid())?;

        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IncidentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IncidentId> for String {
    fn from(value: IncidentId) -> Self {
        value.0
    }
}

impl FromStr for IncidentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a photo already validated and stored by the media layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoRef(String);

impl PhotoRef {
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPhotoRef` if the reference is blank.
    pub fn new(value: &str) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::InvalidPhotoRef);
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhotoRef {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PhotoRef> for String {
    fn from(value: PhotoRef) -> Self {
        value.0
    }
}
