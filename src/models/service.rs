use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::state_machine::{CancelCause, ServiceState};

/// A booked engagement derived from an agreed inquiry.
///
/// Customer and provider are copied from the inquiry's requester and picker
/// when the row is created and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub service_id: i64,
    pub service_uuid: Uuid,
    pub customer_id: i64,
    pub provider_id: i64,
    pub inquiry_id: i64,
    pub price: Option<i64>,
    pub duration_minutes: i32,
    pub appointment_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub service_status: ServiceState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub cancel_cause: CancelCause,
    pub booked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn is_party(&self, user_id: i64) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Counterpart of `user_id` in this engagement
    pub fn counterpart_of(&self, user_id: i64) -> i64 {
        if user_id == self.customer_id {
            self.provider_id
        } else {
            self.customer_id
        }
    }
}

/// Derived service row inserted by agree-to-chat
#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    pub customer_id: i64,
    pub provider_id: i64,
    pub inquiry_id: i64,
    pub duration_minutes: i32,
    pub appointment_time: DateTime<Utc>,
    pub service_status: ServiceState,
}

/// Terms the provider fixes when booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingTerms {
    pub price: i64,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

/// Minimal reconciliation view of a service: ids plus both parties' topics.
///
/// Topics come from each party's registered push topic, so either side can be missing.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ServiceParties {
    pub service_id: i64,
    pub service_uuid: Uuid,
    pub customer_topic: Option<String>,
    pub provider_topic: Option<String>,
}

impl ServiceParties {
    /// Non-empty topics for this service's parties
    pub fn topics(&self) -> Vec<String> {
        [&self.customer_topic, &self.provider_topic]
            .into_iter()
            .flatten()
            .filter(|topic| !topic.is_empty())
            .cloned()
            .collect()
    }
}
