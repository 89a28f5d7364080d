use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::state_machine::InquiryState;

/// A request for service.
///
/// Maps to the `inquiries` table. `inquiry_uuid` is the id exposed to clients
/// and used as the projection key; `inquiry_id` is internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Inquiry {
    pub inquiry_id: i64,
    pub inquiry_uuid: Uuid,
    pub inquirer_id: i64,
    pub picker_id: Option<i64>,
    pub budget: i64,
    pub service_type: String,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub address: String,
    #[sqlx(try_from = "String")]
    pub inquiry_status: InquiryState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Inquiry {
    /// Whether the TTL has run out. Only meaningful while the inquiry is open.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.inquiry_status == InquiryState::Inquiring && self.expired_at <= now
    }

    pub fn is_party(&self, user_id: i64) -> bool {
        self.inquirer_id == user_id || self.picker_id == Some(user_id)
    }

    /// The other party of `user_id` in this inquiry, if one is assigned
    pub fn counterpart_of(&self, user_id: i64) -> Option<i64> {
        if user_id == self.inquirer_id {
            self.picker_id
        } else {
            Some(self.inquirer_id)
        }
    }
}

/// Attributes supplied by a requester creating an inquiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInquiry {
    pub budget: i64,
    pub service_type: String,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub address: String,
}

impl NewInquiry {
    /// Expiry stamp for an inquiry created at `created_at`
    pub fn expiry_for(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        created_at + ttl
    }
}
