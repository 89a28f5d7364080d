use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::InvalidStateError;

/// Inquiry status values as stored in `inquiries.inquiry_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InquiryState {
    /// Initial state, open for providers to pick up
    #[default]
    Inquiring,
    /// A provider claimed the inquiry and awaits the requester's answer
    Asking,
    /// Extended flow: provider waits for the requester to approve
    WaitForInquirerApprove,
    /// Both parties are chatting and negotiating terms
    Chatting,
    /// Terms agreed, a service is booked
    Booked,
    /// Requester aborted before pickup
    Canceled,
    /// Nobody picked the inquiry up within its TTL
    Expired,
}

impl InquiryState {
    pub const ALL: [InquiryState; 7] = [
        Self::Inquiring,
        Self::Asking,
        Self::WaitForInquirerApprove,
        Self::Chatting,
        Self::Booked,
        Self::Canceled,
        Self::Expired,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Booked | Self::Canceled | Self::Expired)
    }

    /// Active inquiries count against the one-open-inquiry-per-requester rule
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiring => "inquiring",
            Self::Asking => "asking",
            Self::WaitForInquirerApprove => "wait_for_inquirer_approve",
            Self::Chatting => "chatting",
            Self::Booked => "booked",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for InquiryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InquiryState {
    type Err = InvalidStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inquiring" => Ok(Self::Inquiring),
            "asking" => Ok(Self::Asking),
            "wait_for_inquirer_approve" => Ok(Self::WaitForInquirerApprove),
            "chatting" => Ok(Self::Chatting),
            "booked" => Ok(Self::Booked),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            _ => Err(InvalidStateError::new("inquiry", s)),
        }
    }
}

impl TryFrom<String> for InquiryState {
    type Error = InvalidStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Service status values as stored in `services.service_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Chat is open, terms not yet booked
    Negotiating,
    /// Booked, waiting for the customer's payment
    #[default]
    Unpaid,
    /// Paid, waiting for the appointment
    ToBeFulfilled,
    /// Payment never arrived within the payment window
    PaymentFailed,
    /// The engagement is under way
    Fulfilling,
    /// The engagement finished
    Completed,
    /// Canceled by one of the parties
    Canceled,
    /// The appointment passed without the service starting
    Expired,
}

impl ServiceState {
    pub const ALL: [ServiceState; 8] = [
        Self::Negotiating,
        Self::Unpaid,
        Self::ToBeFulfilled,
        Self::PaymentFailed,
        Self::Fulfilling,
        Self::Completed,
        Self::Canceled,
        Self::Expired,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::PaymentFailed | Self::Expired
        )
    }

    /// Check if the service is currently being delivered
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Fulfilling)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negotiating => "negotiating",
            Self::Unpaid => "unpaid",
            Self::ToBeFulfilled => "to_be_fulfilled",
            Self::PaymentFailed => "payment_failed",
            Self::Fulfilling => "fulfilling",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceState {
    type Err = InvalidStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "negotiating" => Ok(Self::Negotiating),
            "unpaid" => Ok(Self::Unpaid),
            "to_be_fulfilled" => Ok(Self::ToBeFulfilled),
            "payment_failed" => Ok(Self::PaymentFailed),
            "fulfilling" => Ok(Self::Fulfilling),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            _ => Err(InvalidStateError::new("service", s)),
        }
    }
}

impl TryFrom<String> for ServiceState {
    type Error = InvalidStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Why a service ended up canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancelCause {
    #[default]
    None,
    GirlCancelBeforeAppointmentTime,
    GirlCancelAfterAppointmentTime,
    GuyCancelBeforeAppointmentTime,
    GuyCancelAfterAppointmentTime,
    PaymentFailed,
}

impl CancelCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::GirlCancelBeforeAppointmentTime => "girl_cancel_before_appointment_time",
            Self::GirlCancelAfterAppointmentTime => "girl_cancel_after_appointment_time",
            Self::GuyCancelBeforeAppointmentTime => "guy_cancel_before_appointment_time",
            Self::GuyCancelAfterAppointmentTime => "guy_cancel_after_appointment_time",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CancelCause {
    type Err = InvalidStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "girl_cancel_before_appointment_time" => Ok(Self::GirlCancelBeforeAppointmentTime),
            "girl_cancel_after_appointment_time" => Ok(Self::GirlCancelAfterAppointmentTime),
            "guy_cancel_before_appointment_time" => Ok(Self::GuyCancelBeforeAppointmentTime),
            "guy_cancel_after_appointment_time" => Ok(Self::GuyCancelAfterAppointmentTime),
            "payment_failed" => Ok(Self::PaymentFailed),
            _ => Err(InvalidStateError::new("cancel cause", s)),
        }
    }
}

impl TryFrom<String> for CancelCause {
    type Error = InvalidStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
