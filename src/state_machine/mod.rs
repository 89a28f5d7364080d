// State machine module for the inquiry and service lifecycles
//
// Both machines are small, fixed and pure: they are seeded with the status read
// from the relational store and compute the destination status for an event.

pub mod errors;
pub mod events;
pub mod guards;
pub mod inquiry_state_machine;
pub mod service_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardError, InvalidStateError, StateMachineError};
pub use events::{InquiryEvent, ServiceEvent};
pub use inquiry_state_machine::InquiryStateMachine;
pub use service_state_machine::ServiceStateMachine;
pub use states::{CancelCause, InquiryState, ServiceState};

// Common traits and utilities
pub use guards::StateGuard;
