//! # Relational Store
//!
//! The system of record for users, inquiries, chat rooms, services and
//! payments.
//!
//! - [`store`] - gateway traits consumed by the orchestrator and schedulers
//! - [`postgres`] - PostgreSQL implementation over a shared `PgPool`
//! - [`connection`] - pool construction and health check
//! - [`migrations`] - embedded schema migrations

pub mod connection;
pub mod migrations;
pub mod postgres;
pub mod store;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
pub use postgres::{PgLifecycleStore, PgLifecycleTransaction};
pub use store::{
    LifecycleStore, LifecycleTransaction, PickerChange, ServiceChanges, StoreError, StoreResult,
};
