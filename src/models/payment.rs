use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A customer's payment for a service.
///
/// `refunded_at` is stamped the one time a refund is credited, which keeps the
/// refund policy from being applied twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: i64,
    pub payer_id: i64,
    pub service_id: i64,
    pub amount: i64,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_refunded(&self) -> bool {
        self.refunded_at.is_some()
    }
}
