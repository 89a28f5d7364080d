//! # Notification Dispatch
//!
//! Targeted push messages to topic subscribers. Dispatch is fire-and-forget
//! from the lifecycle's point of view: a failed publish is logged by the
//! caller and never touches the relational state that triggered it.

pub mod broadcast;
pub mod db_notifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use broadcast::BroadcastNotifier;
pub use db_notifier::DbNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notification payload of {size} bytes exceeds limit {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Notification dispatcher unavailable: {0}")]
    Unavailable(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// What a notification tells its recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    InquiryPickedUp,
    InquirySkipped,
    ChatStarted,
    ChatReverted,
    ServiceBooked,
    ServicePaid,
    ServiceStarted,
    ServiceCanceled,
    PaymentFailed,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InquiryPickedUp => "inquiry_picked_up",
            Self::InquirySkipped => "inquiry_skipped",
            Self::ChatStarted => "chat_started",
            Self::ChatReverted => "chat_reverted",
            Self::ServiceBooked => "service_booked",
            Self::ServicePaid => "service_paid",
            Self::ServiceStarted => "service_started",
            Self::ServiceCanceled => "service_canceled",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message addressed to one topic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub topic: String,
    pub kind: MessageKind,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(topic: impl Into<String>, kind: MessageKind, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            kind,
            payload,
            published_at: Utc::now(),
        }
    }
}

/// Notification gateway
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, kind: MessageKind, payload: Value) -> NotifyResult<()>;
}
