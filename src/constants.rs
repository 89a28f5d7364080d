//! # Lifecycle Constants
//!
//! Default windows and tick intervals, environment variable names, and the
//! wire names shared with the projection and notification collaborators.

/// Built-in defaults, overridable through [`crate::config::LifecycleConfig`]
pub mod defaults {
    pub const INQUIRY_TTL_MINUTES: i64 = 27;
    pub const PAYMENT_WINDOW_MINUTES: i64 = 30;
    pub const START_BUFFER_MINUTES: i64 = 30;
    pub const REFUND_GRACE_MINUTES: i64 = 30;

    pub const INQUIRY_EXPIRY_TICK_SECONDS: u64 = 60;
    pub const UNPAID_SERVICE_TICK_SECONDS: u64 = 2;
    pub const SERVICE_STATUS_TICK_SECONDS: u64 = 2;
}

pub mod env_vars {
    /// Prefix of layered configuration variables (`RENDEZVOUS__DATABASE__URL`)
    pub const PREFIX: &str = "RENDEZVOUS";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const ENVIRONMENT: &str = "RENDEZVOUS_ENV";
    pub const LOG_FORMAT: &str = "RENDEZVOUS_LOG_FORMAT";

    pub const INQUIRY_EXPIRY_TICK_SECONDS: &str = "INQUIRY_EXPIRY_TICK_SECONDS";
    pub const UNPAID_SERVICE_TICK_SECONDS: &str = "UNPAID_SERVICE_TICK_SECONDS";
    pub const SERVICE_STATUS_TICK_SECONDS: &str = "SERVICE_STATUS_TICK_SECONDS";
}

/// PostgreSQL `NOTIFY` channels
pub mod channels {
    pub const PROJECTION: &str = "lifecycle_projection";
    pub const NOTIFICATIONS: &str = "lifecycle_notifications";
}

/// Capacity of each per-topic broadcast channel
pub const BROADCAST_CAPACITY: usize = 256;
