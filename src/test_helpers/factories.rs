//! Row factories for the in-memory store.
//!
//! Timestamps are expressed relative to "now" so tests can backdate rows past
//! the TTL, payment window or start buffer.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::in_memory_store::InMemoryLifecycleStore;
use crate::constants::defaults;
use crate::models::{Inquiry, Service, User, UserRole};
use crate::state_machine::{CancelCause, InquiryState, ServiceState};

pub const DEFAULT_BALANCE: i64 = 10_000;

/// Customer with a push topic named after them
pub async fn customer(store: &InMemoryLifecycleStore, username: &str) -> User {
    let topic = format!("topic-{username}");
    store
        .add_user(username, UserRole::Customer, DEFAULT_BALANCE, Some(&topic))
        .await
}

/// Provider with a push topic named after them
pub async fn provider(store: &InMemoryLifecycleStore, username: &str) -> User {
    let topic = format!("topic-{username}");
    store
        .add_user(username, UserRole::Provider, DEFAULT_BALANCE, Some(&topic))
        .await
}

#[derive(Debug, Clone)]
pub struct InquiryFactory {
    inquirer_id: i64,
    picker_id: Option<i64>,
    status: InquiryState,
    created_at: DateTime<Utc>,
    ttl: Duration,
    appointment_time: DateTime<Utc>,
    duration_minutes: i32,
    budget: i64,
}

impl InquiryFactory {
    pub fn new(inquirer: &User) -> Self {
        let now = Utc::now();
        Self {
            inquirer_id: inquirer.user_id,
            picker_id: None,
            status: InquiryState::Inquiring,
            created_at: now,
            ttl: Duration::minutes(defaults::INQUIRY_TTL_MINUTES),
            appointment_time: now + Duration::hours(2),
            duration_minutes: 60,
            budget: 3_000,
        }
    }

    pub fn with_status(mut self, status: InquiryState) -> Self {
        self.status = status;
        self
    }

    pub fn with_picker(mut self, picker: &User) -> Self {
        self.picker_id = Some(picker.user_id);
        self
    }

    pub fn created_minutes_ago(mut self, minutes: i64) -> Self {
        self.created_at = Utc::now() - Duration::minutes(minutes);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_appointment(mut self, appointment_time: DateTime<Utc>, duration_minutes: i32) -> Self {
        self.appointment_time = appointment_time;
        self.duration_minutes = duration_minutes;
        self
    }

    pub async fn create(self, store: &InMemoryLifecycleStore) -> Inquiry {
        store
            .put_inquiry(Inquiry {
                inquiry_id: 0,
                inquiry_uuid: Uuid::new_v4(),
                inquirer_id: self.inquirer_id,
                picker_id: self.picker_id,
                budget: self.budget,
                service_type: "companionship".to_string(),
                appointment_time: self.appointment_time,
                duration_minutes: self.duration_minutes,
                address: "Taipei 101".to_string(),
                inquiry_status: self.status,
                created_at: self.created_at,
                updated_at: self.created_at,
                expired_at: self.created_at + self.ttl,
            })
            .await
    }
}

#[derive(Debug, Clone)]
pub struct ServiceFactory {
    customer_id: i64,
    provider_id: i64,
    inquiry_id: i64,
    status: ServiceState,
    price: Option<i64>,
    duration_minutes: i32,
    appointment_time: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    booked_at: Option<DateTime<Utc>>,
}

impl ServiceFactory {
    pub fn new(customer: &User, provider: &User) -> Self {
        let appointment_time = Utc::now() + Duration::hours(2);
        Self {
            customer_id: customer.user_id,
            provider_id: provider.user_id,
            inquiry_id: 0,
            status: ServiceState::Unpaid,
            price: Some(2_500),
            duration_minutes: 60,
            appointment_time,
            start_time: Some(appointment_time),
            end_time: Some(appointment_time + Duration::minutes(60)),
            booked_at: Some(Utc::now()),
        }
    }

    pub fn with_status(mut self, status: ServiceState) -> Self {
        self.status = status;
        self
    }

    pub fn for_inquiry(mut self, inquiry: &Inquiry) -> Self {
        self.inquiry_id = inquiry.inquiry_id;
        self
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn booked_minutes_ago(mut self, minutes: i64) -> Self {
        self.booked_at = Some(Utc::now() - Duration::minutes(minutes));
        self
    }

    /// Appointment offset from now; start and end follow it
    pub fn appointment_in_minutes(mut self, minutes: i64) -> Self {
        self.appointment_time = Utc::now() + Duration::minutes(minutes);
        self.start_time = Some(self.appointment_time);
        self.end_time = Some(self.appointment_time + Duration::minutes(i64::from(self.duration_minutes)));
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub async fn create(self, store: &InMemoryLifecycleStore) -> Service {
        let now = Utc::now();
        store
            .put_service(Service {
                service_id: 0,
                service_uuid: Uuid::new_v4(),
                customer_id: self.customer_id,
                provider_id: self.provider_id,
                inquiry_id: self.inquiry_id,
                price: self.price,
                duration_minutes: self.duration_minutes,
                appointment_time: self.appointment_time,
                service_status: self.status,
                start_time: self.start_time,
                end_time: self.end_time,
                cancel_cause: CancelCause::None,
                booked_at: self.booked_at,
                created_at: now,
                updated_at: now,
            })
            .await
    }
}
