use chrono::Utc;
use rendezvous_core::models::UserRole;
use rendezvous_core::notifications::MessageKind;
use rendezvous_core::projection::ProjectedStatus;
use rendezvous_core::scheduler::scan_unpaid_expired_services;
use rendezvous_core::state_machine::{CancelCause, ServiceState};
use rendezvous_core::test_helpers::{customer, provider, ServiceFactory, TestLifecycle};
use tokio_test::assert_ok;

#[tokio::test]
async fn test_fails_services_past_the_payment_window() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let overdue = ServiceFactory::new(&guy, &girl)
        .booked_minutes_ago(35)
        .create(&t.store)
        .await;
    let recent = ServiceFactory::new(&guy, &girl)
        .booked_minutes_ago(5)
        .create(&t.store)
        .await;

    let report = assert_ok!(scan_unpaid_expired_services(&t.context, Utc::now()).await);

    assert_eq!(report.selected, 1);
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.notified, 2);
    let failed = t.store.service(overdue.service_id).await.unwrap();
    assert_eq!(failed.service_status, ServiceState::PaymentFailed);
    assert_eq!(failed.cancel_cause, CancelCause::PaymentFailed);
    assert_eq!(
        t.projection.status_of(overdue.service_uuid),
        Some(ProjectedStatus::Service(ServiceState::PaymentFailed))
    );
    let still_unpaid = t.store.service(recent.service_id).await.unwrap();
    assert_eq!(still_unpaid.service_status, ServiceState::Unpaid);

    for topic in ["topic-guy", "topic-girl"] {
        let sent = t.notifier.sent_to(topic);
        assert_eq!(sent.len(), 1, "{topic}");
        assert_eq!(sent[0].kind, MessageKind::PaymentFailed);
        assert_eq!(sent[0].payload["service_uuid"], overdue.service_uuid.to_string());
    }
}

#[tokio::test]
async fn test_party_without_topic_is_skipped() {
    let t = TestLifecycle::new();
    let guy = t.store.add_user("guy", UserRole::Customer, 10_000, None).await;
    let girl = provider(&t.store, "girl").await;
    ServiceFactory::new(&guy, &girl)
        .booked_minutes_ago(35)
        .create(&t.store)
        .await;

    let report = assert_ok!(scan_unpaid_expired_services(&t.context, Utc::now()).await);

    assert_eq!(report.transitioned, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(t.notifier.sent_to("topic-girl").len(), 1);
}

#[tokio::test]
async fn test_paid_services_are_never_failed() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let paid = ServiceFactory::new(&guy, &girl)
        .with_status(ServiceState::ToBeFulfilled)
        .booked_minutes_ago(90)
        .create(&t.store)
        .await;

    let report = assert_ok!(scan_unpaid_expired_services(&t.context, Utc::now()).await);

    assert!(report.is_empty());
    let stored = t.store.service(paid.service_id).await.unwrap();
    assert_eq!(stored.service_status, ServiceState::ToBeFulfilled);
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_repeated_scan_does_not_notify_twice() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    ServiceFactory::new(&guy, &girl)
        .booked_minutes_ago(45)
        .create(&t.store)
        .await;
    let now = Utc::now();

    assert_ok!(scan_unpaid_expired_services(&t.context, now).await);
    let second = assert_ok!(scan_unpaid_expired_services(&t.context, now).await);

    assert!(second.is_empty());
    assert_eq!(t.notifier.sent_count(), 2);
}

#[tokio::test]
async fn test_failed_mirror_is_repaired_without_renotifying() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let overdue = ServiceFactory::new(&guy, &girl)
        .booked_minutes_ago(40)
        .create(&t.store)
        .await;

    t.projection.set_failing(true);
    let first = assert_ok!(scan_unpaid_expired_services(&t.context, Utc::now()).await);
    assert_eq!(first.transitioned, 1);
    assert_eq!(first.notified, 2);
    assert_eq!(first.mirrored, 0);

    t.projection.set_failing(false);
    let second = assert_ok!(scan_unpaid_expired_services(&t.context, Utc::now()).await);
    assert_eq!(second.transitioned, 0);
    assert_eq!(second.notified, 0);
    assert_eq!(second.mirrored, 1);
    assert_eq!(
        t.projection.status_of(overdue.service_uuid),
        Some(ProjectedStatus::Service(ServiceState::PaymentFailed))
    );
    assert_eq!(t.notifier.sent_count(), 2);
}
