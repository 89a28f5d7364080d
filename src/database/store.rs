//! # Relational Store Gateway
//!
//! Collaborator contract between the lifecycle core and the relational system
//! of record. Reads that feed a decision go through [`LifecycleStore`]; every
//! mutation goes through a [`LifecycleTransaction`] opened by the caller and
//! passed down, so one use-case commits or rolls back as a unit.
//!
//! Status updates are conditional on the status the state machine was seeded
//! with. A row that moved underneath the caller yields
//! [`StoreError::ConcurrentModification`] instead of a silent overwrite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ChatRoom, Inquiry, NewInquiry, NewService, Payment, Service, ServiceParties, User,
};
use crate::projection::ProjectedStatus;
use crate::state_machine::{CancelCause, InquiryState, ServiceState};

/// Error type for relational store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Concurrent modification detected for {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: String },

    #[error("Database constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("Invalid row data: {0}")]
    InvalidRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn concurrent(entity: &'static str, id: impl ToString) -> Self {
        Self::ConcurrentModification {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a status update treats the inquiry's picker column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerChange {
    Keep,
    Set(i64),
    Clear,
}

/// Column changes applied together with a service status update.
///
/// `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceChanges {
    pub price: Option<i64>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cancel_cause: Option<CancelCause>,
    pub booked_at: Option<DateTime<Utc>>,
}

/// Read side of the relational gateway plus the transaction factory
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Open a short-lived transaction
    async fn begin(&self) -> StoreResult<Box<dyn LifecycleTransaction>>;

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_uuid(&self, user_uuid: Uuid) -> StoreResult<Option<User>>;

    async fn find_inquiry_by_uuid(&self, inquiry_uuid: Uuid) -> StoreResult<Option<Inquiry>>;

    async fn find_service_by_uuid(&self, service_uuid: Uuid) -> StoreResult<Option<Service>>;

    /// Most recent service derived from the inquiry
    async fn find_service_by_inquiry(&self, inquiry_id: i64) -> StoreResult<Option<Service>>;

    async fn find_open_chat_room(&self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>>;

    /// Inquiries still `inquiring` whose expiry stamp is at or before `now`
    async fn select_expired_inquiries(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inquiry>>;

    /// Services still `unpaid` that were booked at or before `booked_before`
    async fn select_unpaid_expired_services(
        &self,
        booked_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>>;

    /// Services still `to_be_fulfilled` whose start time is at or before `started_before`
    async fn select_unstarted_services(
        &self,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>>;

    /// Services `fulfilling` whose end time is at or before `now`
    async fn select_finished_services(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>>;

    /// Inquiries in `status` whose last accepted projection differs from it
    async fn select_unmirrored_inquiries(&self, status: InquiryState) -> StoreResult<Vec<Uuid>>;

    /// Services in `status` whose last accepted projection differs from it
    async fn select_unmirrored_services(&self, status: ServiceState) -> StoreResult<Vec<Uuid>>;

    /// Record that the projection store accepted `status` for these rows
    async fn mark_projected(&self, entity_uuids: &[Uuid], status: ProjectedStatus)
        -> StoreResult<()>;
}

/// Write side of the relational gateway, scoped to one transaction
#[async_trait]
pub trait LifecycleTransaction: Send {
    /// Whether the requester owns any non-terminal inquiry
    async fn has_active_inquiry(&mut self, inquirer_id: i64) -> StoreResult<bool>;

    async fn insert_inquiry(
        &mut self,
        inquirer_id: i64,
        new_inquiry: &NewInquiry,
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    ) -> StoreResult<Inquiry>;

    /// Move one inquiry from `from` to `to`; fails if it is no longer in `from`.
    ///
    /// `expired_at` restamps the expiry when the inquiry reopens.
    async fn update_inquiry_status(
        &mut self,
        inquiry_id: i64,
        from: InquiryState,
        to: InquiryState,
        picker: PickerChange,
        expired_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Inquiry>;

    /// Move every listed inquiry still in `from` to `to`, returning the uuids that moved
    async fn bulk_transition_inquiries(
        &mut self,
        inquiry_ids: &[i64],
        from: InquiryState,
        to: InquiryState,
    ) -> StoreResult<Vec<Uuid>>;

    async fn insert_chat_room(
        &mut self,
        inquiry_id: i64,
        channel_uuid: Uuid,
        member_ids: &[i64],
    ) -> StoreResult<ChatRoom>;

    /// Soft-delete the inquiry's open chat room, if any
    async fn close_chat_room(&mut self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>>;

    async fn insert_service(&mut self, new_service: &NewService) -> StoreResult<Service>;

    /// Move one service from `from` to `to` applying `changes`; fails if it is no longer in `from`
    async fn update_service_status(
        &mut self,
        service_id: i64,
        from: ServiceState,
        to: ServiceState,
        changes: &ServiceChanges,
    ) -> StoreResult<Service>;

    /// Move every listed service still in `from` to `to`, returning the uuids that moved
    async fn bulk_transition_services(
        &mut self,
        service_ids: &[i64],
        from: ServiceState,
        to: ServiceState,
        cancel_cause: Option<CancelCause>,
    ) -> StoreResult<Vec<Uuid>>;

    /// Debit `amount` if the balance covers it; returns false and leaves the balance otherwise
    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<bool>;

    /// Credit `amount`, returning the new balance
    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<i64>;

    async fn insert_payment(
        &mut self,
        payer_id: i64,
        service_id: i64,
        amount: i64,
    ) -> StoreResult<Payment>;

    /// Load the service's payment, locking it for the rest of the transaction
    async fn find_payment_for_update(&mut self, service_id: i64) -> StoreResult<Option<Payment>>;

    /// Stamp the refund; returns false when it was already stamped
    async fn mark_payment_refunded(
        &mut self,
        payment_id: i64,
        refunded_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
