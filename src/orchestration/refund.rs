//! Cancellation cause and refund policy.
//!
//! Pure functions of the canceller's role and the cancellation time relative
//! to the appointment. Applying the refund, and recording that it was applied,
//! is the orchestrator's job.

use chrono::{DateTime, Duration, Utc};

use crate::models::UserRole;
use crate::state_machine::CancelCause;

/// Cause recorded on a service canceled by `canceller` at `now`.
///
/// Providers are recorded as "girl", customers as "guy". Cancelling exactly at
/// the appointment time counts as after it.
pub fn cancel_cause(canceller: UserRole, appointment_time: DateTime<Utc>, now: DateTime<Utc>) -> CancelCause {
    let before = now < appointment_time;
    match (canceller, before) {
        (UserRole::Provider, true) => CancelCause::GirlCancelBeforeAppointmentTime,
        (UserRole::Provider, false) => CancelCause::GirlCancelAfterAppointmentTime,
        (UserRole::Customer, true) => CancelCause::GuyCancelBeforeAppointmentTime,
        (UserRole::Customer, false) => CancelCause::GuyCancelAfterAppointmentTime,
    }
}

/// Whether cancelling at `now` refunds the customer.
///
/// Only a provider cancelling strictly inside `(appointment, appointment + grace)` does.
pub fn refund_due(
    canceller: UserRole,
    appointment_time: DateTime<Utc>,
    now: DateTime<Utc>,
    grace: Duration,
) -> bool {
    canceller == UserRole::Provider && appointment_time < now && now < appointment_time + grace
}
