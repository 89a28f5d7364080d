#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rendezvous Core
//!
//! Lifecycle core of the rendezvous marketplace backend: customers post
//! inquiries, providers pick them up, both sides chat, agree on terms, pay
//! and fulfil a service.
//!
//! ## Overview
//!
//! Two explicit state machines govern the lifecycle. Every transition is
//! applied to PostgreSQL (the system of record) inside one transaction, then
//! mirrored to a denormalised projection and announced to the counterpart
//! over a push channel. Three reconciliation schedulers drive the time-based
//! transitions nobody triggers: inquiry expiry, payment timeout, and service
//! start/finish.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - inquiry and service states, events, transition tables and guards
//! - [`models`] - row types for users, inquiries, chat rooms, services and payments
//! - [`database`] - relational store traits and the PostgreSQL implementation
//! - [`projection`] - read-side status documents
//! - [`notifications`] - per-user push channel
//! - [`orchestration`] - transactional lifecycle use-cases
//! - [`scheduler`] - periodic reconciliation jobs
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`test_helpers`] - in-memory collaborators for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rendezvous_core::config::LifecycleConfig;
//! use rendezvous_core::database::DatabaseConnection;
//! use rendezvous_core::orchestration::{LifecycleContext, LifecycleOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LifecycleConfig::load(None)?;
//! let connection = DatabaseConnection::connect(&config.database).await?;
//! let context = LifecycleContext::from_pool(connection.pool().clone(), config.policy.clone());
//! let orchestrator = LifecycleOrchestrator::new(context);
//! # let _ = orchestrator;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live beside the code; integration tests drive the orchestrator
//! and schedulers against the in-memory store:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod orchestration;
pub mod projection;
pub mod scheduler;
pub mod state_machine;
pub mod test_helpers;

pub use config::{DatabaseConfig, LifecycleConfig, LifecyclePolicy, SchedulerConfig};
pub use error::{LifecycleError, LifecycleResult};
pub use orchestration::{LifecycleContext, LifecycleOrchestrator};
pub use scheduler::{ReconciliationScan, ScanReport, SchedulerSet};
pub use state_machine::{
    CancelCause, InquiryEvent, InquiryState, InquiryStateMachine, ServiceEvent, ServiceState,
    ServiceStateMachine,
};
