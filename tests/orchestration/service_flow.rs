use rendezvous_core::error::LifecycleError;
use rendezvous_core::models::UserRole;
use rendezvous_core::notifications::MessageKind;
use rendezvous_core::projection::ProjectedStatus;
use rendezvous_core::state_machine::{CancelCause, InquiryState, ServiceState};
use rendezvous_core::test_helpers::{
    customer, provider, ServiceFactory, TestLifecycle, DEFAULT_BALANCE,
};
use tokio_test::{assert_err, assert_ok};

use super::{new_inquiry, terms};

#[tokio::test]
async fn test_full_lifecycle_to_fulfilling() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();

    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);
    assert_ok!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, guy.user_uuid).await);
    let booking = assert_ok!(orchestrator.book(inquiry.inquiry_uuid, girl.user_uuid, terms(2_000)).await);
    let service_uuid = booking.service.service_uuid;

    let receipt = assert_ok!(orchestrator.pay(service_uuid, guy.user_uuid).await);
    assert_eq!(receipt.service.service_status, ServiceState::ToBeFulfilled);
    assert_eq!(receipt.payment.amount, 2_000);
    assert_eq!(receipt.payment.payer_id, guy.user_id);
    let payer = t.store.user(guy.user_id).await.unwrap();
    assert_eq!(payer.balance, DEFAULT_BALANCE - 2_000);
    assert_eq!(t.notifier.sent_to("topic-girl").last().map(|n| n.kind), Some(MessageKind::ServicePaid));

    let started = assert_ok!(orchestrator.start_service(service_uuid, girl.user_uuid).await);
    assert_eq!(started.service_status, ServiceState::Fulfilling);
    let (start, end) = (started.start_time.unwrap(), started.end_time.unwrap());
    assert_eq!(end - start, chrono::Duration::minutes(60));
    assert_eq!(
        t.projection.status_of(service_uuid),
        Some(ProjectedStatus::Service(ServiceState::Fulfilling))
    );
    assert_eq!(t.notifier.sent_to("topic-guy").last().map(|n| n.kind), Some(MessageKind::ServiceStarted));

    let stored_inquiry = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored_inquiry.inquiry_status, InquiryState::Booked);
}

#[tokio::test]
async fn test_only_customer_pays() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let service = ServiceFactory::new(&guy, &girl).create(&t.store).await;

    let err = assert_err!(t.orchestrator().pay(service.service_uuid, girl.user_uuid).await);

    assert!(matches!(err, LifecycleError::Forbidden(_)));
    assert!(t.store.payment_for(service.service_id).await.is_none());
}

#[tokio::test]
async fn test_insufficient_balance_changes_nothing() {
    let t = TestLifecycle::new();
    let guy = t.store.add_user("guy", UserRole::Customer, 100, Some("topic-guy")).await;
    let girl = provider(&t.store, "girl").await;
    let service = ServiceFactory::new(&guy, &girl)
        .with_price(2_500)
        .create(&t.store)
        .await;

    let err = assert_err!(t.orchestrator().pay(service.service_uuid, guy.user_uuid).await);

    match err {
        LifecycleError::InsufficientBalance { required, available } => {
            assert_eq!(required, 2_500);
            assert_eq!(available, 100);
        }
        other => panic!("expected insufficient balance, got {other:?}"),
    }
    assert_eq!(t.store.user(guy.user_id).await.unwrap().balance, 100);
    let stored = t.store.service(service.service_id).await.unwrap();
    assert_eq!(stored.service_status, ServiceState::Unpaid);
    assert!(t.store.payment_for(service.service_id).await.is_none());
    assert_eq!(t.projection.write_count(), 0);
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_paying_twice_is_rejected() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let service = ServiceFactory::new(&guy, &girl).create(&t.store).await;
    let orchestrator = t.orchestrator();

    assert_ok!(orchestrator.pay(service.service_uuid, guy.user_uuid).await);
    let err = assert_err!(orchestrator.pay(service.service_uuid, guy.user_uuid).await);

    assert!(matches!(err, LifecycleError::TransitionRejected(_)));
    assert_eq!(
        t.store.user(guy.user_id).await.unwrap().balance,
        DEFAULT_BALANCE - 2_500
    );
}

#[tokio::test]
async fn test_provider_cancel_inside_grace_refunds_exactly_once() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let service = ServiceFactory::new(&guy, &girl)
        .with_status(ServiceState::ToBeFulfilled)
        .appointment_in_minutes(-10)
        .create(&t.store)
        .await;
    let payment = t.store.put_payment(guy.user_id, service.service_id, 2_500).await;
    let orchestrator = t.orchestrator();

    let cancellation = assert_ok!(orchestrator.cancel_service(service.service_uuid, girl.user_uuid).await);

    assert_eq!(cancellation.refunded, Some(payment.amount));
    assert_eq!(cancellation.service.service_status, ServiceState::Canceled);
    assert_eq!(
        cancellation.service.cancel_cause,
        CancelCause::GirlCancelAfterAppointmentTime
    );
    assert_eq!(
        t.store.user(guy.user_id).await.unwrap().balance,
        DEFAULT_BALANCE + payment.amount
    );
    assert!(t.store.payment_for(service.service_id).await.unwrap().is_refunded());
    assert_eq!(
        t.notifier.sent_to("topic-guy").last().map(|n| n.kind),
        Some(MessageKind::ServiceCanceled)
    );

    // A second cancellation cannot refund again
    assert_err!(orchestrator.cancel_service(service.service_uuid, girl.user_uuid).await);
    assert_eq!(
        t.store.user(guy.user_id).await.unwrap().balance,
        DEFAULT_BALANCE + payment.amount
    );
}

#[tokio::test]
async fn test_cancellations_outside_the_refund_rule_keep_the_balance() {
    // (canceller is provider, appointment offset in minutes, expected cause)
    let cases = [
        (false, -10, CancelCause::GuyCancelAfterAppointmentTime),
        (true, 60, CancelCause::GirlCancelBeforeAppointmentTime),
        (true, -45, CancelCause::GirlCancelAfterAppointmentTime),
    ];

    for (by_provider, offset, cause) in cases {
        let t = TestLifecycle::new();
        let guy = customer(&t.store, "guy").await;
        let girl = provider(&t.store, "girl").await;
        let service = ServiceFactory::new(&guy, &girl)
            .with_status(ServiceState::ToBeFulfilled)
            .appointment_in_minutes(offset)
            .create(&t.store)
            .await;
        t.store.put_payment(guy.user_id, service.service_id, 2_500).await;
        let canceller = if by_provider { &girl } else { &guy };

        let cancellation = assert_ok!(
            t.orchestrator()
                .cancel_service(service.service_uuid, canceller.user_uuid)
                .await
        );

        assert_eq!(cancellation.refunded, None, "offset {offset}");
        assert_eq!(cancellation.service.cancel_cause, cause);
        assert_eq!(t.store.user(guy.user_id).await.unwrap().balance, DEFAULT_BALANCE);
        assert!(!t.store.payment_for(service.service_id).await.unwrap().is_refunded());
    }
}

#[tokio::test]
async fn test_outsider_cannot_touch_a_service() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let outsider = provider(&t.store, "outsider").await;
    let service = ServiceFactory::new(&guy, &girl)
        .with_status(ServiceState::ToBeFulfilled)
        .create(&t.store)
        .await;
    let orchestrator = t.orchestrator();

    let err = assert_err!(orchestrator.start_service(service.service_uuid, outsider.user_uuid).await);
    assert!(matches!(err, LifecycleError::Forbidden(_)));
    let err = assert_err!(orchestrator.cancel_service(service.service_uuid, outsider.user_uuid).await);
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let stored = t.store.service(service.service_id).await.unwrap();
    assert_eq!(stored.service_status, ServiceState::ToBeFulfilled);
}
