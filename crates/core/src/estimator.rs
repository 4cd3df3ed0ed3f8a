// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_desk_domain::Priority;
use thiserror::Error;

/// What an estimator sees about a new incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateRequest<'a> {
    pub priority: Priority,
    pub short_description: &'a str,
    pub full_message: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("estimation service unavailable: {0}")]
    Unavailable(String),
    #[error("estimation service returned an unusable answer: {0}")]
    Unusable(String),
}

/// External service proposing how long an incident should take to resolve.
///
/// Proposals are advisory: the deadline policy decides whether to use them.
#[async_trait]
pub trait DeadlineEstimator: Send + Sync {
    async fn estimate(
        &self,
        request: &EstimateRequest<'_>,
    ) -> Result<chrono::Duration, EstimateError>;
}
