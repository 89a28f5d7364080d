//! # Lifecycle Orchestrator
//!
//! Transactional use-cases for inquiries and services. Each one follows the
//! same sequence:
//!
//! 1. Load the rows by external id and check the acting user's guard.
//! 2. Seed the state machine with the stored status and attempt the event.
//! 3. Apply the destination status inside one relational transaction.
//! 4. After the commit, mirror the new status to the projection store.
//! 5. Notify the counterpart.
//!
//! Steps 3 to 5 only run when step 2 succeeds, and nothing is mirrored or
//! notified unless the commit succeeded.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::context::LifecycleContext;
use super::propagation::{mirror, notify_user};
use super::refund::{cancel_cause, refund_due};
use crate::database::{LifecycleTransaction, PickerChange, ServiceChanges};
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{
    BookingTerms, ChatRoom, Inquiry, NewInquiry, NewService, Payment, Service, User,
};
use crate::notifications::MessageKind;
use crate::projection::ProjectionUpdate;
use crate::state_machine::guards::{
    CustomerOnlyGuard, EligiblePickerGuard, InquiryPartyGuard, PickerOnlyGuard,
    RequesterOnlyGuard, ServicePartyGuard,
};
use crate::state_machine::{
    InquiryEvent, InquiryState, InquiryStateMachine, ServiceEvent, ServiceState,
    ServiceStateMachine, StateGuard,
};

/// Result of `agree_to_chat`
#[derive(Debug, Clone, PartialEq)]
pub struct ChatStarted {
    pub inquiry: Inquiry,
    pub service: Service,
    pub chat_room: ChatRoom,
}

/// Result of `book`
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub inquiry: Inquiry,
    pub service: Service,
}

/// Result of `pay`
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub service: Service,
    pub payment: Payment,
}

/// Result of `cancel_service`
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCancellation {
    pub service: Service,
    /// Amount credited back to the customer, if the refund policy applied
    pub refunded: Option<i64>,
}

/// Commit on success, roll back on failure
pub(crate) async fn finish<T>(
    tx: Box<dyn LifecycleTransaction>,
    outcome: LifecycleResult<T>,
) -> LifecycleResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Transactional entry point for every user-driven lifecycle transition
#[derive(Debug, Clone)]
pub struct LifecycleOrchestrator {
    context: LifecycleContext,
}

impl LifecycleOrchestrator {
    pub fn new(context: LifecycleContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LifecycleContext {
        &self.context
    }

    async fn load_user(&self, user_uuid: Uuid) -> LifecycleResult<User> {
        self.context
            .store
            .find_user_by_uuid(user_uuid)
            .await?
            .ok_or_else(|| LifecycleError::not_found("user", user_uuid))
    }

    async fn load_inquiry(&self, inquiry_uuid: Uuid) -> LifecycleResult<Inquiry> {
        self.context
            .store
            .find_inquiry_by_uuid(inquiry_uuid)
            .await?
            .ok_or_else(|| LifecycleError::not_found("inquiry", inquiry_uuid))
    }

    async fn load_service(&self, service_uuid: Uuid) -> LifecycleResult<Service> {
        self.context
            .store
            .find_service_by_uuid(service_uuid)
            .await?
            .ok_or_else(|| LifecycleError::not_found("service", service_uuid))
    }

    async fn load_derived_service(&self, inquiry: &Inquiry) -> LifecycleResult<Service> {
        self.context
            .store
            .find_service_by_inquiry(inquiry.inquiry_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("service for inquiry", inquiry.inquiry_uuid))
    }

    async fn picker_name(&self, inquiry: &Inquiry) -> Option<String> {
        let picker_id = inquiry.picker_id?;
        match self.context.store.find_user(picker_id).await {
            Ok(user) => user.map(|picker| picker.username),
            Err(e) => {
                warn!(inquiry_uuid = %inquiry.inquiry_uuid, error = %e, "Failed to load picker name");
                None
            }
        }
    }

    fn inquiry_target(inquiry: &Inquiry, event: InquiryEvent) -> LifecycleResult<InquiryState> {
        let mut machine = InquiryStateMachine::new(inquiry.inquiry_uuid, inquiry.inquiry_status);
        Ok(machine.transition(event)?)
    }

    fn service_target(service: &Service, event: ServiceEvent) -> LifecycleResult<ServiceState> {
        let mut machine = ServiceStateMachine::new(service.service_uuid, service.service_status);
        Ok(machine.transition(event)?)
    }

    /// Open a new inquiry for `requester_uuid`
    pub async fn create_inquiry(
        &self,
        requester_uuid: Uuid,
        new_inquiry: NewInquiry,
    ) -> LifecycleResult<Inquiry> {
        if new_inquiry.budget <= 0 {
            return Err(LifecycleError::Validation("budget must be positive".to_string()));
        }
        if new_inquiry.duration_minutes <= 0 {
            return Err(LifecycleError::Validation("duration must be positive".to_string()));
        }

        let requester = self.load_user(requester_uuid).await?;
        let created_at = Utc::now();
        let expired_at = NewInquiry::expiry_for(created_at, self.context.policy.inquiry_ttl());

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<Inquiry> = async {
            if tx.has_active_inquiry(requester.user_id).await? {
                return Err(LifecycleError::Conflict(format!(
                    "user {} already has an active inquiry",
                    requester.user_uuid
                )));
            }
            Ok(tx
                .insert_inquiry(requester.user_id, &new_inquiry, created_at, expired_at)
                .await?)
        }
        .await;
        let inquiry = finish(tx, outcome).await?;

        info!(
            inquiry_uuid = %inquiry.inquiry_uuid,
            requester = %requester.user_uuid,
            expired_at = %inquiry.expired_at,
            "Inquiry created"
        );
        mirror(
            &self.context,
            ProjectionUpdate::new(inquiry.inquiry_uuid, inquiry.inquiry_status),
        )
        .await;

        Ok(inquiry)
    }

    /// A provider claims an open inquiry
    pub async fn pickup(&self, inquiry_uuid: Uuid, picker_uuid: Uuid) -> LifecycleResult<Inquiry> {
        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let picker = self.load_user(picker_uuid).await?;
        EligiblePickerGuard.check(&inquiry, &picker)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::Pickup)?;

        let mut tx = self.context.store.begin().await?;
        let outcome = tx
            .update_inquiry_status(
                inquiry.inquiry_id,
                inquiry.inquiry_status,
                target,
                PickerChange::Set(picker.user_id),
                None,
            )
            .await
            .map_err(LifecycleError::from);
        let updated = finish(tx, outcome).await?;

        info!(inquiry_uuid = %inquiry_uuid, picker = %picker_uuid, status = %target, "Inquiry picked up");
        mirror(
            &self.context,
            ProjectionUpdate::new(updated.inquiry_uuid, target).with_picker_name(&picker.username),
        )
        .await;
        notify_user(
            &self.context,
            updated.inquirer_id,
            MessageKind::InquiryPickedUp,
            json!({
                "inquiry_uuid": updated.inquiry_uuid,
                "status": target,
                "picker_name": picker.username,
            }),
        )
        .await;

        Ok(updated)
    }

    /// Either party declines while asking; the inquiry reopens
    pub async fn skip(&self, inquiry_uuid: Uuid, actor_uuid: Uuid) -> LifecycleResult<Inquiry> {
        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let actor = self.load_user(actor_uuid).await?;
        InquiryPartyGuard.check(&inquiry, &actor)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::Skip)?;
        let reopened_expiry = Utc::now() + self.context.policy.inquiry_ttl();

        let mut tx = self.context.store.begin().await?;
        let outcome = tx
            .update_inquiry_status(
                inquiry.inquiry_id,
                inquiry.inquiry_status,
                target,
                PickerChange::Clear,
                Some(reopened_expiry),
            )
            .await
            .map_err(LifecycleError::from);
        let updated = finish(tx, outcome).await?;

        info!(inquiry_uuid = %inquiry_uuid, actor = %actor_uuid, status = %target, "Inquiry skipped");
        mirror(&self.context, ProjectionUpdate::new(updated.inquiry_uuid, target)).await;
        if let Some(counterpart) = inquiry.counterpart_of(actor.user_id) {
            notify_user(
                &self.context,
                counterpart,
                MessageKind::InquirySkipped,
                json!({ "inquiry_uuid": updated.inquiry_uuid, "status": target }),
            )
            .await;
        }

        Ok(updated)
    }

    /// The requester accepts the picker: opens a chat room and derives the service
    pub async fn agree_to_chat(
        &self,
        inquiry_uuid: Uuid,
        requester_uuid: Uuid,
    ) -> LifecycleResult<ChatStarted> {
        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let requester = self.load_user(requester_uuid).await?;
        RequesterOnlyGuard.check(&inquiry, &requester)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::AgreeToChat)?;
        let picker_id = inquiry.picker_id.ok_or_else(|| {
            LifecycleError::Conflict(format!("inquiry {inquiry_uuid} has no picker"))
        })?;

        let new_service = NewService {
            customer_id: inquiry.inquirer_id,
            provider_id: picker_id,
            inquiry_id: inquiry.inquiry_id,
            duration_minutes: inquiry.duration_minutes,
            appointment_time: inquiry.appointment_time,
            service_status: ServiceState::Negotiating,
        };
        let channel_uuid = Uuid::new_v4();

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<ChatStarted> = async {
            let inquiry = tx
                .update_inquiry_status(
                    inquiry.inquiry_id,
                    inquiry.inquiry_status,
                    target,
                    PickerChange::Keep,
                    None,
                )
                .await?;
            let chat_room = tx
                .insert_chat_room(
                    inquiry.inquiry_id,
                    channel_uuid,
                    &[inquiry.inquirer_id, picker_id],
                )
                .await?;
            let service = tx.insert_service(&new_service).await?;
            Ok(ChatStarted {
                inquiry,
                service,
                chat_room,
            })
        }
        .await;
        let started = finish(tx, outcome).await?;

        info!(
            inquiry_uuid = %inquiry_uuid,
            service_uuid = %started.service.service_uuid,
            channel_uuid = %channel_uuid,
            "Chat started"
        );

        let mut inquiry_update = ProjectionUpdate::new(inquiry_uuid, target)
            .with_channel(channel_uuid)
            .with_service(started.service.service_uuid);
        if let Some(name) = self.picker_name(&started.inquiry).await {
            inquiry_update = inquiry_update.with_picker_name(name);
        }
        mirror(&self.context, inquiry_update).await;
        mirror(
            &self.context,
            ProjectionUpdate::new(started.service.service_uuid, started.service.service_status)
                .with_channel(channel_uuid),
        )
        .await;
        notify_user(
            &self.context,
            picker_id,
            MessageKind::ChatStarted,
            json!({
                "inquiry_uuid": inquiry_uuid,
                "service_uuid": started.service.service_uuid,
                "channel_uuid": channel_uuid,
            }),
        )
        .await;

        Ok(started)
    }

    /// Either party leaves the chat before booking; the inquiry reopens
    pub async fn revert_chat(&self, inquiry_uuid: Uuid, actor_uuid: Uuid) -> LifecycleResult<Inquiry> {
        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let actor = self.load_user(actor_uuid).await?;
        InquiryPartyGuard.check(&inquiry, &actor)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::RevertChat)?;
        let service = self.load_derived_service(&inquiry).await?;
        let service_target = Self::service_target(&service, ServiceEvent::Abandon)?;
        let reopened_expiry = Utc::now() + self.context.policy.inquiry_ttl();

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<(Inquiry, Service)> = async {
            let reopened = tx
                .update_inquiry_status(
                    inquiry.inquiry_id,
                    inquiry.inquiry_status,
                    target,
                    PickerChange::Clear,
                    Some(reopened_expiry),
                )
                .await?;
            tx.close_chat_room(inquiry.inquiry_id).await?;
            let abandoned = tx
                .update_service_status(
                    service.service_id,
                    service.service_status,
                    service_target,
                    &ServiceChanges::default(),
                )
                .await?;
            Ok((reopened, abandoned))
        }
        .await;
        let (reopened, abandoned) = finish(tx, outcome).await?;

        info!(
            inquiry_uuid = %inquiry_uuid,
            service_uuid = %abandoned.service_uuid,
            actor = %actor_uuid,
            "Chat reverted"
        );
        mirror(&self.context, ProjectionUpdate::new(inquiry_uuid, target)).await;
        mirror(
            &self.context,
            ProjectionUpdate::new(abandoned.service_uuid, service_target),
        )
        .await;
        if let Some(counterpart) = inquiry.counterpart_of(actor.user_id) {
            notify_user(
                &self.context,
                counterpart,
                MessageKind::ChatReverted,
                json!({ "inquiry_uuid": inquiry_uuid, "status": target }),
            )
            .await;
        }

        Ok(reopened)
    }

    /// The picker fixes the terms; the inquiry is booked and the service awaits payment
    pub async fn book(
        &self,
        inquiry_uuid: Uuid,
        picker_uuid: Uuid,
        terms: BookingTerms,
    ) -> LifecycleResult<Booking> {
        if terms.price <= 0 {
            return Err(LifecycleError::Validation("price must be positive".to_string()));
        }
        if terms.duration_minutes <= 0 {
            return Err(LifecycleError::Validation("duration must be positive".to_string()));
        }

        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let picker = self.load_user(picker_uuid).await?;
        PickerOnlyGuard.check(&inquiry, &picker)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::Book)?;
        let service = self.load_derived_service(&inquiry).await?;
        let service_target = Self::service_target(&service, ServiceEvent::Book)?;
        let chat_room = self.context.store.find_open_chat_room(inquiry.inquiry_id).await?;

        let booked_at = Utc::now();
        let duration = chrono::Duration::minutes(i64::from(terms.duration_minutes));
        let changes = ServiceChanges {
            price: Some(terms.price),
            appointment_time: Some(terms.appointment_time),
            duration_minutes: Some(terms.duration_minutes),
            start_time: Some(terms.appointment_time),
            end_time: Some(terms.appointment_time + duration),
            booked_at: Some(booked_at),
            ..ServiceChanges::default()
        };

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<Booking> = async {
            let inquiry = tx
                .update_inquiry_status(
                    inquiry.inquiry_id,
                    inquiry.inquiry_status,
                    target,
                    PickerChange::Keep,
                    None,
                )
                .await?;
            let service = tx
                .update_service_status(
                    service.service_id,
                    service.service_status,
                    service_target,
                    &changes,
                )
                .await?;
            Ok(Booking { inquiry, service })
        }
        .await;
        let booking = finish(tx, outcome).await?;

        info!(
            inquiry_uuid = %inquiry_uuid,
            service_uuid = %booking.service.service_uuid,
            price = terms.price,
            "Service booked"
        );

        let mut inquiry_update = ProjectionUpdate::new(inquiry_uuid, target)
            .with_picker_name(&picker.username)
            .with_service(booking.service.service_uuid);
        let mut service_update = ProjectionUpdate::new(booking.service.service_uuid, service_target);
        if let Some(room) = &chat_room {
            inquiry_update = inquiry_update.with_channel(room.channel_uuid);
            service_update = service_update.with_channel(room.channel_uuid);
        }
        mirror(&self.context, inquiry_update).await;
        mirror(&self.context, service_update).await;

        let payload = json!({
            "inquiry_uuid": inquiry_uuid,
            "service_uuid": booking.service.service_uuid,
            "status": service_target,
            "price": terms.price,
            "appointment_time": terms.appointment_time,
        });
        for party in [booking.service.customer_id, booking.service.provider_id] {
            notify_user(&self.context, party, MessageKind::ServiceBooked, payload.clone()).await;
        }

        Ok(booking)
    }

    /// The requester withdraws an inquiry nobody picked up yet
    pub async fn cancel(&self, inquiry_uuid: Uuid, requester_uuid: Uuid) -> LifecycleResult<Inquiry> {
        let inquiry = self.load_inquiry(inquiry_uuid).await?;
        let requester = self.load_user(requester_uuid).await?;
        RequesterOnlyGuard.check(&inquiry, &requester)?;
        let target = Self::inquiry_target(&inquiry, InquiryEvent::Cancel)?;

        let mut tx = self.context.store.begin().await?;
        let outcome = tx
            .update_inquiry_status(
                inquiry.inquiry_id,
                inquiry.inquiry_status,
                target,
                PickerChange::Keep,
                None,
            )
            .await
            .map_err(LifecycleError::from);
        let canceled = finish(tx, outcome).await?;

        info!(inquiry_uuid = %inquiry_uuid, "Inquiry canceled");
        mirror(&self.context, ProjectionUpdate::new(inquiry_uuid, target)).await;

        Ok(canceled)
    }

    /// The customer pays the booked price from their balance
    pub async fn pay(&self, service_uuid: Uuid, payer_uuid: Uuid) -> LifecycleResult<PaymentReceipt> {
        let service = self.load_service(service_uuid).await?;
        let payer = self.load_user(payer_uuid).await?;
        CustomerOnlyGuard.check(&service, &payer)?;
        let target = Self::service_target(&service, ServiceEvent::Paid)?;
        let price = service.price.ok_or_else(|| {
            LifecycleError::Conflict(format!("service {service_uuid} has no agreed price"))
        })?;

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<PaymentReceipt> = async {
            if !tx.debit_balance(payer.user_id, price).await? {
                return Err(LifecycleError::InsufficientBalance {
                    required: price,
                    available: payer.balance,
                });
            }
            let service = tx
                .update_service_status(
                    service.service_id,
                    service.service_status,
                    target,
                    &ServiceChanges::default(),
                )
                .await?;
            let payment = tx
                .insert_payment(payer.user_id, service.service_id, price)
                .await?;
            Ok(PaymentReceipt { service, payment })
        }
        .await;
        let receipt = finish(tx, outcome).await?;

        info!(service_uuid = %service_uuid, amount = price, "Service paid");
        mirror(&self.context, ProjectionUpdate::new(service_uuid, target)).await;
        notify_user(
            &self.context,
            receipt.service.provider_id,
            MessageKind::ServicePaid,
            json!({ "service_uuid": service_uuid, "status": target, "amount": price }),
        )
        .await;

        Ok(receipt)
    }

    /// Either party starts a paid service
    pub async fn start_service(&self, service_uuid: Uuid, actor_uuid: Uuid) -> LifecycleResult<Service> {
        let service = self.load_service(service_uuid).await?;
        let actor = self.load_user(actor_uuid).await?;
        ServicePartyGuard.check(&service, &actor)?;
        let target = Self::service_target(&service, ServiceEvent::StartService)?;

        let started_at = Utc::now();
        let changes = ServiceChanges {
            start_time: Some(started_at),
            end_time: Some(started_at + service.duration()),
            ..ServiceChanges::default()
        };

        let mut tx = self.context.store.begin().await?;
        let outcome = tx
            .update_service_status(service.service_id, service.service_status, target, &changes)
            .await
            .map_err(LifecycleError::from);
        let started = finish(tx, outcome).await?;

        info!(service_uuid = %service_uuid, end_time = ?started.end_time, "Service started");
        mirror(&self.context, ProjectionUpdate::new(service_uuid, target)).await;
        notify_user(
            &self.context,
            started.counterpart_of(actor.user_id),
            MessageKind::ServiceStarted,
            json!({ "service_uuid": service_uuid, "status": target, "end_time": started.end_time }),
        )
        .await;

        Ok(started)
    }

    /// Either party cancels a paid service, refunding the customer when the policy says so
    pub async fn cancel_service(
        &self,
        service_uuid: Uuid,
        canceller_uuid: Uuid,
    ) -> LifecycleResult<ServiceCancellation> {
        let service = self.load_service(service_uuid).await?;
        let canceller = self.load_user(canceller_uuid).await?;
        ServicePartyGuard.check(&service, &canceller)?;
        let target = Self::service_target(&service, ServiceEvent::Cancel)?;

        let now = Utc::now();
        let cause = cancel_cause(canceller.role, service.appointment_time, now);
        let refund = refund_due(
            canceller.role,
            service.appointment_time,
            now,
            self.context.policy.refund_grace(),
        );
        let changes = ServiceChanges {
            cancel_cause: Some(cause),
            ..ServiceChanges::default()
        };

        let mut tx = self.context.store.begin().await?;
        let outcome: LifecycleResult<ServiceCancellation> = async {
            let canceled = tx
                .update_service_status(service.service_id, service.service_status, target, &changes)
                .await?;

            let mut refunded = None;
            if refund {
                if let Some(payment) = tx.find_payment_for_update(service.service_id).await? {
                    if tx.mark_payment_refunded(payment.payment_id, now).await? {
                        tx.credit_balance(canceled.customer_id, payment.amount).await?;
                        refunded = Some(payment.amount);
                    }
                }
            }
            Ok(ServiceCancellation {
                service: canceled,
                refunded,
            })
        }
        .await;
        let cancellation = finish(tx, outcome).await?;

        info!(
            service_uuid = %service_uuid,
            cause = %cause,
            refunded = ?cancellation.refunded,
            "Service canceled"
        );
        mirror(&self.context, ProjectionUpdate::new(service_uuid, target)).await;
        notify_user(
            &self.context,
            cancellation.service.counterpart_of(canceller.user_id),
            MessageKind::ServiceCanceled,
            json!({
                "service_uuid": service_uuid,
                "status": target,
                "cancel_cause": cause,
                "refunded": cancellation.refunded,
            }),
        )
        .await;

        Ok(cancellation)
    }
}
