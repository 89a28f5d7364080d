//! # Lifecycle Orchestration
//!
//! Transactional use-cases that drive inquiries and services through their
//! state machines, plus the post-commit propagation they share with the
//! reconciliation schedulers.
//!
//! - [`context`] - collaborators injected into every component
//! - [`lifecycle_orchestrator`] - one operation per user-driven transition
//! - [`propagation`] - best-effort projection and notification writes
//! - [`refund`] - cancellation cause and refund policy

pub mod context;
pub mod lifecycle_orchestrator;
pub mod propagation;
pub mod refund;

pub use context::LifecycleContext;
pub use lifecycle_orchestrator::{
    Booking, ChatStarted, LifecycleOrchestrator, PaymentReceipt, ServiceCancellation,
};
