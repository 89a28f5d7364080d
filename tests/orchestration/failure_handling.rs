use rendezvous_core::error::LifecycleError;
use rendezvous_core::projection::ProjectedStatus;
use rendezvous_core::state_machine::{InquiryState, ServiceState};
use rendezvous_core::test_helpers::{customer, provider, InquiryFactory, ServiceFactory, TestLifecycle};
use tokio_test::{assert_err, assert_ok};

use super::new_inquiry;

#[tokio::test]
async fn test_failed_commit_propagates_nothing() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let inquiry = InquiryFactory::new(&guy).create(&t.store).await;

    t.store.fail_next_commit();
    let err = assert_err!(t.orchestrator().pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert!(matches!(err, LifecycleError::Store(_)));
    assert_eq!(err.error_code(), "store_failure");
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Inquiring);
    assert_eq!(stored.picker_id, None);
    assert_eq!(t.projection.write_count(), 0);
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_failed_commit_keeps_balance_and_payment_untouched() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let service = ServiceFactory::new(&guy, &girl).create(&t.store).await;

    t.store.fail_next_commit();
    assert_err!(t.orchestrator().pay(service.service_uuid, guy.user_uuid).await);

    assert_eq!(t.store.user(guy.user_id).await.unwrap().balance, guy.balance);
    assert!(t.store.payment_for(service.service_id).await.is_none());
    assert_eq!(
        t.store.service(service.service_id).await.unwrap().service_status,
        ServiceState::Unpaid
    );
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_projection_outage_does_not_undo_the_commit() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let inquiry = InquiryFactory::new(&guy).create(&t.store).await;
    t.projection.set_failing(true);

    let picked = assert_ok!(t.orchestrator().pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert_eq!(picked.inquiry_status, InquiryState::Asking);
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Asking);
    assert_eq!(t.projection.failed_attempts(), 1);
    assert_eq!(t.projection.write_count(), 0);
    // The counterpart still hears about it
    assert_eq!(t.notifier.sent_to("topic-guy").len(), 1);
    assert!(!t.store.snapshot().await.projected.contains_key(&inquiry.inquiry_uuid));

    // The next transition re-mirrors the current status
    t.projection.set_failing(false);
    assert_ok!(t.orchestrator().skip(inquiry.inquiry_uuid, girl.user_uuid).await);
    assert_eq!(
        t.projection.status_of(inquiry.inquiry_uuid),
        Some(ProjectedStatus::Inquiry(InquiryState::Inquiring))
    );
    assert_eq!(
        t.store.snapshot().await.projected.get(&inquiry.inquiry_uuid),
        Some(&ProjectedStatus::Inquiry(InquiryState::Inquiring))
    );
}

#[tokio::test]
async fn test_notifier_outage_does_not_fail_the_use_case() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let inquiry = InquiryFactory::new(&guy).create(&t.store).await;
    t.notifier.set_failing(true);

    assert_ok!(t.orchestrator().pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert_eq!(t.notifier.sent_count(), 0);
    assert_eq!(t.projection.write_count(), 1);
}

#[tokio::test]
async fn test_missing_push_topic_skips_notification() {
    let t = TestLifecycle::new();
    let guy = t
        .store
        .add_user("guy", rendezvous_core::models::UserRole::Customer, 10_000, None)
        .await;
    let girl = provider(&t.store, "girl").await;
    let inquiry = InquiryFactory::new(&guy).create(&t.store).await;

    assert_ok!(t.orchestrator().pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_store_failure() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    t.store.set_unavailable(true);

    let err = assert_err!(t.orchestrator().create_inquiry(guy.user_uuid, new_inquiry()).await);

    assert_eq!(err.error_code(), "store_failure");
    assert!(!err.is_client_error());
    assert_eq!(t.projection.write_count(), 0);
}
