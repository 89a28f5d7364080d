use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that can trigger inquiry state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryEvent {
    /// A provider claims the inquiry
    Pickup,
    /// Provider or requester declines, the inquiry reopens
    Skip,
    /// Requester accepts the provider and opens a chat
    AgreeToChat,
    /// Either party leaves the chat before booking
    RevertChat,
    /// Terms are agreed and the service is booked
    Book,
    /// Requester aborts before pickup
    Cancel,
    /// TTL elapsed while still open
    Expire,
}

impl InquiryEvent {
    pub const ALL: [InquiryEvent; 7] = [
        Self::Pickup,
        Self::Skip,
        Self::AgreeToChat,
        Self::RevertChat,
        Self::Book,
        Self::Cancel,
        Self::Expire,
    ];

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Skip => "skip",
            Self::AgreeToChat => "agree_to_chat",
            Self::RevertChat => "revert_chat",
            Self::Book => "book",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        }
    }
}

impl fmt::Display for InquiryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// Events that can trigger service state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceEvent {
    /// Terms set while negotiating, payment is now due
    Book,
    /// Chat torn down before booking
    Abandon,
    /// Customer paid
    Paid,
    /// Payment window elapsed
    PayFailed,
    /// A party canceled before fulfillment
    Cancel,
    /// Appointment reached, service begins
    StartService,
    /// Service duration elapsed
    Complete,
    /// Appointment plus buffer elapsed without a start
    Expired,
}

impl ServiceEvent {
    pub const ALL: [ServiceEvent; 8] = [
        Self::Book,
        Self::Abandon,
        Self::Paid,
        Self::PayFailed,
        Self::Cancel,
        Self::StartService,
        Self::Complete,
        Self::Expired,
    ];

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Abandon => "abandon",
            Self::Paid => "paid",
            Self::PayFailed => "pay_failed",
            Self::Cancel => "cancel",
            Self::StartService => "start_service",
            Self::Complete => "complete",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}
