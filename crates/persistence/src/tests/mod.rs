// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod contract_tests;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use incident_desk_domain::{
    Branch, Department, Incident, IncidentId, NewIncident, Priority, UserId,
};

use crate::{InMemoryStore, IncidentStore, Persistence};

/// Both store implementations, labelled for assertion messages.
pub fn stores() -> Vec<(&'static str, Box<dyn IncidentStore>)> {
    vec![
        ("memory", Box::new(InMemoryStore::new())),
        (
            "sqlite",
            Box::new(Persistence::new_in_memory().expect("in-memory sqlite")),
        ),
    ]
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap()
}

pub fn business_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

/// A `Created` incident for `reporter` with sequence `seq`.
pub fn created_incident(seq: u32, reporter: &str) -> Incident {
    let intake: NewIncident = NewIncident {
        reporter_id: user(reporter),
        branch: Branch::Chilonzor,
        department: Department::Procurement,
        priority: Priority::High,
        short_description: String::from("Fryer oil delivery missing"),
        full_message: String::from("Morning delivery of fryer oil did not arrive."),
    };
    Incident::created(
        IncidentId::from_parts(business_date(), seq),
        intake,
        base_time() + Duration::hours(4),
        user("900"),
        base_time(),
    )
}
