//! Orchestrator Integration Tests
//!
//! Drive the lifecycle use-cases end to end against the in-memory store.

mod failure_handling;
mod inquiry_flow;
mod service_flow;

use chrono::{Duration, Utc};
use rendezvous_core::models::{BookingTerms, NewInquiry};

pub fn new_inquiry() -> NewInquiry {
    NewInquiry {
        budget: 3_000,
        service_type: "dinner".to_string(),
        appointment_time: Utc::now() + Duration::hours(3),
        duration_minutes: 90,
        address: "Xinyi District".to_string(),
    }
}

pub fn terms(price: i64) -> BookingTerms {
    BookingTerms {
        price,
        appointment_time: Utc::now() + Duration::hours(4),
        duration_minutes: 60,
    }
}
