//! Transactional in-memory relational store.
//!
//! `begin` takes the store lock for the lifetime of the transaction and works
//! on a staged copy; `commit` swaps the copy in, `rollback` or a dropped
//! transaction discards it. Do not read through the store while holding a
//! transaction on the same task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::{
    LifecycleStore, LifecycleTransaction, PickerChange, ServiceChanges, StoreError, StoreResult,
};
use crate::models::{
    ChatRoom, Inquiry, NewInquiry, NewService, Payment, Service, ServiceParties, User, UserRole,
};
use crate::projection::ProjectedStatus;
use crate::state_machine::{CancelCause, InquiryState, ServiceState};

/// Rows held by the in-memory store, keyed by internal id
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub users: BTreeMap<i64, User>,
    pub inquiries: BTreeMap<i64, Inquiry>,
    pub services: BTreeMap<i64, Service>,
    pub chat_rooms: BTreeMap<i64, ChatRoom>,
    pub chat_room_members: Vec<(i64, i64)>,
    pub payments: BTreeMap<i64, Payment>,
    /// Last status the projection store accepted, keyed by entity uuid
    pub projected: BTreeMap<Uuid, ProjectedStatus>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn topic_of(&self, user_id: i64) -> Option<String> {
        self.users
            .get(&user_id)
            .and_then(|user| user.topic().map(str::to_string))
    }

    fn parties(&self, service: &Service) -> ServiceParties {
        ServiceParties {
            service_id: service.service_id,
            service_uuid: service.service_uuid,
            customer_topic: self.topic_of(service.customer_id),
            provider_topic: self.topic_of(service.provider_id),
        }
    }

    fn select_services<F>(&self, predicate: F) -> Vec<ServiceParties>
    where
        F: Fn(&Service) -> bool,
    {
        self.services
            .values()
            .filter(|service| predicate(service))
            .map(|service| self.parties(service))
            .collect()
    }

    fn is_mirrored(&self, entity_uuid: Uuid, status: ProjectedStatus) -> bool {
        self.projected.get(&entity_uuid) == Some(&status)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLifecycleStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail without applying anything
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make every read and `begin` fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> StoreResult<T> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(f(&state))
    }

    /// Snapshot of every row
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    pub async fn add_user(
        &self,
        username: &str,
        role: UserRole,
        balance: i64,
        push_topic: Option<&str>,
    ) -> User {
        let mut state = self.state.lock().await;
        let user_id = state.next_id();
        let user = User {
            user_id,
            user_uuid: Uuid::new_v4(),
            username: username.to_string(),
            role,
            balance,
            push_topic: push_topic.map(str::to_string),
            created_at: Utc::now(),
        };
        state.users.insert(user_id, user.clone());
        user
    }

    /// Insert a fully-formed inquiry row, assigning its id
    pub async fn put_inquiry(&self, mut inquiry: Inquiry) -> Inquiry {
        let mut state = self.state.lock().await;
        inquiry.inquiry_id = state.next_id();
        state.inquiries.insert(inquiry.inquiry_id, inquiry.clone());
        inquiry
    }

    /// Insert a fully-formed service row, assigning its id
    pub async fn put_service(&self, mut service: Service) -> Service {
        let mut state = self.state.lock().await;
        service.service_id = state.next_id();
        state.services.insert(service.service_id, service.clone());
        service
    }

    pub async fn put_payment(&self, payer_id: i64, service_id: i64, amount: i64) -> Payment {
        let mut state = self.state.lock().await;
        let payment = Payment {
            payment_id: state.next_id(),
            payer_id,
            service_id,
            amount,
            refunded_at: None,
            created_at: Utc::now(),
        };
        state.payments.insert(payment.payment_id, payment.clone());
        payment
    }

    pub async fn user(&self, user_id: i64) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn inquiry(&self, inquiry_id: i64) -> Option<Inquiry> {
        self.state.lock().await.inquiries.get(&inquiry_id).cloned()
    }

    pub async fn service(&self, service_id: i64) -> Option<Service> {
        self.state.lock().await.services.get(&service_id).cloned()
    }

    pub async fn payment_for(&self, service_id: i64) -> Option<Payment> {
        self.state
            .lock()
            .await
            .payments
            .values()
            .find(|payment| payment.service_id == service_id)
            .cloned()
    }
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn begin(&self) -> StoreResult<Box<dyn LifecycleTransaction>> {
        self.check_available()?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        let fail_commit = self.fail_next_commit.swap(false, Ordering::SeqCst);
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            fail_commit,
        }))
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        self.read(|state| state.users.get(&user_id).cloned()).await
    }

    async fn find_user_by_uuid(&self, user_uuid: Uuid) -> StoreResult<Option<User>> {
        self.read(|state| {
            state
                .users
                .values()
                .find(|user| user.user_uuid == user_uuid)
                .cloned()
        })
        .await
    }

    async fn find_inquiry_by_uuid(&self, inquiry_uuid: Uuid) -> StoreResult<Option<Inquiry>> {
        self.read(|state| {
            state
                .inquiries
                .values()
                .find(|inquiry| inquiry.inquiry_uuid == inquiry_uuid)
                .cloned()
        })
        .await
    }

    async fn find_service_by_uuid(&self, service_uuid: Uuid) -> StoreResult<Option<Service>> {
        self.read(|state| {
            state
                .services
                .values()
                .find(|service| service.service_uuid == service_uuid)
                .cloned()
        })
        .await
    }

    async fn find_service_by_inquiry(&self, inquiry_id: i64) -> StoreResult<Option<Service>> {
        self.read(|state| {
            state
                .services
                .values()
                .rev()
                .find(|service| service.inquiry_id == inquiry_id)
                .cloned()
        })
        .await
    }

    async fn find_open_chat_room(&self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>> {
        self.read(|state| {
            state
                .chat_rooms
                .values()
                .rev()
                .find(|room| room.inquiry_id == inquiry_id && room.is_open())
                .cloned()
        })
        .await
    }

    async fn select_expired_inquiries(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inquiry>> {
        self.read(|state| {
            state
                .inquiries
                .values()
                .filter(|inquiry| inquiry.is_past_expiry(now))
                .cloned()
                .collect()
        })
        .await
    }

    async fn select_unpaid_expired_services(
        &self,
        booked_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.read(|state| {
            state.select_services(|service| {
                service.service_status == ServiceState::Unpaid
                    && service.booked_at.is_some_and(|at| at <= booked_before)
            })
        })
        .await
    }

    async fn select_unstarted_services(
        &self,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.read(|state| {
            state.select_services(|service| {
                service.service_status == ServiceState::ToBeFulfilled
                    && service.start_time.is_some_and(|at| at <= started_before)
            })
        })
        .await
    }

    async fn select_finished_services(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.read(|state| {
            state.select_services(|service| {
                service.service_status == ServiceState::Fulfilling
                    && service.end_time.is_some_and(|at| at <= now)
            })
        })
        .await
    }

    async fn select_unmirrored_inquiries(&self, status: InquiryState) -> StoreResult<Vec<Uuid>> {
        self.read(|state| {
            state
                .inquiries
                .values()
                .filter(|inquiry| {
                    inquiry.inquiry_status == status
                        && !state.is_mirrored(inquiry.inquiry_uuid, status.into())
                })
                .map(|inquiry| inquiry.inquiry_uuid)
                .collect()
        })
        .await
    }

    async fn select_unmirrored_services(&self, status: ServiceState) -> StoreResult<Vec<Uuid>> {
        self.read(|state| {
            state
                .services
                .values()
                .filter(|service| {
                    service.service_status == status
                        && !state.is_mirrored(service.service_uuid, status.into())
                })
                .map(|service| service.service_uuid)
                .collect()
        })
        .await
    }

    async fn mark_projected(
        &self,
        entity_uuids: &[Uuid],
        status: ProjectedStatus,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        for entity_uuid in entity_uuids {
            state.projected.insert(*entity_uuid, status);
        }
        Ok(())
    }
}

/// Transaction over a staged copy of the store
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
    fail_commit: bool,
}

#[async_trait]
impl LifecycleTransaction for InMemoryTransaction {
    async fn has_active_inquiry(&mut self, inquirer_id: i64) -> StoreResult<bool> {
        Ok(self
            .staged
            .inquiries
            .values()
            .any(|inquiry| inquiry.inquirer_id == inquirer_id && inquiry.inquiry_status.is_active()))
    }

    async fn insert_inquiry(
        &mut self,
        inquirer_id: i64,
        new_inquiry: &NewInquiry,
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    ) -> StoreResult<Inquiry> {
        if self.has_active_inquiry(inquirer_id).await? {
            return Err(StoreError::ConstraintViolation {
                constraint: "inquiries_one_active_per_inquirer".to_string(),
            });
        }
        let inquiry = Inquiry {
            inquiry_id: self.staged.next_id(),
            inquiry_uuid: Uuid::new_v4(),
            inquirer_id,
            picker_id: None,
            budget: new_inquiry.budget,
            service_type: new_inquiry.service_type.clone(),
            appointment_time: new_inquiry.appointment_time,
            duration_minutes: new_inquiry.duration_minutes,
            address: new_inquiry.address.clone(),
            inquiry_status: InquiryState::Inquiring,
            created_at,
            updated_at: created_at,
            expired_at,
        };
        self.staged.inquiries.insert(inquiry.inquiry_id, inquiry.clone());
        Ok(inquiry)
    }

    async fn update_inquiry_status(
        &mut self,
        inquiry_id: i64,
        from: InquiryState,
        to: InquiryState,
        picker: PickerChange,
        expired_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Inquiry> {
        let inquiry = self
            .staged
            .inquiries
            .get_mut(&inquiry_id)
            .filter(|inquiry| inquiry.inquiry_status == from)
            .ok_or_else(|| StoreError::concurrent("inquiry", inquiry_id))?;

        inquiry.inquiry_status = to;
        match picker {
            PickerChange::Keep => {}
            PickerChange::Set(picker_id) => inquiry.picker_id = Some(picker_id),
            PickerChange::Clear => inquiry.picker_id = None,
        }
        if let Some(expired_at) = expired_at {
            inquiry.expired_at = expired_at;
        }
        inquiry.updated_at = Utc::now();
        Ok(inquiry.clone())
    }

    async fn bulk_transition_inquiries(
        &mut self,
        inquiry_ids: &[i64],
        from: InquiryState,
        to: InquiryState,
    ) -> StoreResult<Vec<Uuid>> {
        let now = Utc::now();
        let mut moved = Vec::new();
        for id in inquiry_ids {
            if let Some(inquiry) = self.staged.inquiries.get_mut(id) {
                if inquiry.inquiry_status == from {
                    inquiry.inquiry_status = to;
                    inquiry.updated_at = now;
                    moved.push(inquiry.inquiry_uuid);
                }
            }
        }
        Ok(moved)
    }

    async fn insert_chat_room(
        &mut self,
        inquiry_id: i64,
        channel_uuid: Uuid,
        member_ids: &[i64],
    ) -> StoreResult<ChatRoom> {
        let room = ChatRoom {
            chat_room_id: self.staged.next_id(),
            channel_uuid,
            inquiry_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.staged.chat_rooms.insert(room.chat_room_id, room.clone());
        self.staged
            .chat_room_members
            .extend(member_ids.iter().map(|member| (room.chat_room_id, *member)));
        Ok(room)
    }

    async fn close_chat_room(&mut self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>> {
        let room = self
            .staged
            .chat_rooms
            .values_mut()
            .find(|room| room.inquiry_id == inquiry_id && room.is_open());
        Ok(room.map(|room| {
            room.deleted_at = Some(Utc::now());
            room.clone()
        }))
    }

    async fn insert_service(&mut self, new_service: &NewService) -> StoreResult<Service> {
        let negotiating_exists = self.staged.services.values().any(|service| {
            service.inquiry_id == new_service.inquiry_id
                && service.service_status == ServiceState::Negotiating
        });
        if negotiating_exists {
            return Err(StoreError::ConstraintViolation {
                constraint: "services_one_negotiating_per_inquiry".to_string(),
            });
        }

        let now = Utc::now();
        let service = Service {
            service_id: self.staged.next_id(),
            service_uuid: Uuid::new_v4(),
            customer_id: new_service.customer_id,
            provider_id: new_service.provider_id,
            inquiry_id: new_service.inquiry_id,
            price: None,
            duration_minutes: new_service.duration_minutes,
            appointment_time: new_service.appointment_time,
            service_status: new_service.service_status,
            start_time: None,
            end_time: None,
            cancel_cause: CancelCause::None,
            booked_at: None,
            created_at: now,
            updated_at: now,
        };
        self.staged.services.insert(service.service_id, service.clone());
        Ok(service)
    }

    async fn update_service_status(
        &mut self,
        service_id: i64,
        from: ServiceState,
        to: ServiceState,
        changes: &ServiceChanges,
    ) -> StoreResult<Service> {
        let service = self
            .staged
            .services
            .get_mut(&service_id)
            .filter(|service| service.service_status == from)
            .ok_or_else(|| StoreError::concurrent("service", service_id))?;

        service.service_status = to;
        if let Some(price) = changes.price {
            service.price = Some(price);
        }
        if let Some(appointment_time) = changes.appointment_time {
            service.appointment_time = appointment_time;
        }
        if let Some(duration_minutes) = changes.duration_minutes {
            service.duration_minutes = duration_minutes;
        }
        if changes.start_time.is_some() {
            service.start_time = changes.start_time;
        }
        if changes.end_time.is_some() {
            service.end_time = changes.end_time;
        }
        if let Some(cause) = changes.cancel_cause {
            service.cancel_cause = cause;
        }
        if changes.booked_at.is_some() {
            service.booked_at = changes.booked_at;
        }
        service.updated_at = Utc::now();
        Ok(service.clone())
    }

    async fn bulk_transition_services(
        &mut self,
        service_ids: &[i64],
        from: ServiceState,
        to: ServiceState,
        cancel_cause: Option<CancelCause>,
    ) -> StoreResult<Vec<Uuid>> {
        let now = Utc::now();
        let mut moved = Vec::new();
        for id in service_ids {
            if let Some(service) = self.staged.services.get_mut(id) {
                if service.service_status == from {
                    service.service_status = to;
                    if let Some(cause) = cancel_cause {
                        service.cancel_cause = cause;
                    }
                    service.updated_at = now;
                    moved.push(service.service_uuid);
                }
            }
        }
        Ok(moved)
    }

    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<bool> {
        match self.staged.users.get_mut(&user_id) {
            Some(user) if user.balance >= amount => {
                user.balance -= amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<i64> {
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::InvalidRow(format!("user {user_id} does not exist")))?;
        user.balance += amount;
        Ok(user.balance)
    }

    async fn insert_payment(
        &mut self,
        payer_id: i64,
        service_id: i64,
        amount: i64,
    ) -> StoreResult<Payment> {
        if self
            .staged
            .payments
            .values()
            .any(|payment| payment.service_id == service_id)
        {
            return Err(StoreError::ConstraintViolation {
                constraint: "payments_service_id_key".to_string(),
            });
        }
        let payment = Payment {
            payment_id: self.staged.next_id(),
            payer_id,
            service_id,
            amount,
            refunded_at: None,
            created_at: Utc::now(),
        };
        self.staged.payments.insert(payment.payment_id, payment.clone());
        Ok(payment)
    }

    async fn find_payment_for_update(&mut self, service_id: i64) -> StoreResult<Option<Payment>> {
        Ok(self
            .staged
            .payments
            .values()
            .find(|payment| payment.service_id == service_id)
            .cloned())
    }

    async fn mark_payment_refunded(
        &mut self,
        payment_id: i64,
        refunded_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.staged.payments.get_mut(&payment_id) {
            Some(payment) if payment.refunded_at.is_none() => {
                payment.refunded_at = Some(refunded_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTransaction {
            mut guard,
            staged,
            fail_commit,
        } = *self;
        if fail_commit {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
