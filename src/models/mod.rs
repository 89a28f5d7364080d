//! # Lifecycle Models
//!
//! Row types for the relational system of record plus the input shapes the
//! lifecycle use-cases accept. Status columns decode straight into the state
//! machine enums so an unknown status string fails at the row boundary.

pub mod chat_room;
pub mod inquiry;
pub mod payment;
pub mod service;
pub mod user;

pub use chat_room::ChatRoom;
pub use inquiry::{Inquiry, NewInquiry};
pub use payment::Payment;
pub use service::{BookingTerms, NewService, Service, ServiceParties};
pub use user::{User, UserRole};
