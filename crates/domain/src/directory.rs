// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use crate::types::{Department, UserId};
use std::collections::BTreeMap;

/// Maps each department to the person responsible for its incidents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentDirectory {
    heads: BTreeMap<Department, UserId>,
}

impl DepartmentDirectory {
    #[must_use]
    pub fn new(heads: BTreeMap<Department, UserId>) -> Self {
        Self { heads }
    }

    /// Returns the responsible person for `department`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoResponsibleForDepartment` if nobody is assigned.
    pub fn responsible_for(&self, department: Department) -> Result<&UserId, DomainError> {
        self.heads
            .get(&department)
            .ok_or(DomainError::NoResponsibleForDepartment(department))
    }

    /// Returns the departments `user` is responsible for, in catalog order.
    #[must_use]
    pub fn departments_of(&self, user: &UserId) -> Vec<Department> {
        self.heads
            .iter()
            .filter(|(_, head)| *head == user)
            .map(|(department, _)| *department)
            .collect()
    }

    /// Ensures every catalog department has a responsible person.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoResponsibleForDepartment` for the first gap.
    pub fn validate_complete(&self) -> Result<(), DomainError> {
        Department::ALL
            .into_iter()
            .try_for_each(|department| self.responsible_for(department).map(|_| ()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Department, &UserId)> {
        self.heads.iter().map(|(department, head)| (*department, head))
    }
}

impl FromIterator<(Department, UserId)> for DepartmentDirectory {
    fn from_iter<I: IntoIterator<Item = (Department, UserId)>>(iter: I) -> Self {
        Self {
            heads: iter.into_iter().collect(),
        }
    }
}
