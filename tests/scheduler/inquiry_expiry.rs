use chrono::Utc;
use rendezvous_core::projection::ProjectedStatus;
use rendezvous_core::scheduler::scan_expired_inquiries;
use rendezvous_core::state_machine::InquiryState;
use rendezvous_core::test_helpers::{customer, provider, InquiryFactory, ProjectionWrite, TestLifecycle};
use tokio_test::assert_ok;

#[tokio::test]
async fn test_expires_only_inquiries_past_their_ttl() {
    let t = TestLifecycle::new();
    let mut stale = Vec::new();
    for name in ["a", "b", "c"] {
        let guy = customer(&t.store, name).await;
        stale.push(InquiryFactory::new(&guy).created_minutes_ago(30).create(&t.store).await);
    }
    let fresh_owner = customer(&t.store, "d").await;
    let fresh = InquiryFactory::new(&fresh_owner)
        .created_minutes_ago(10)
        .create(&t.store)
        .await;

    let report = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);

    assert_eq!(report.selected, 3);
    assert_eq!(report.transitioned, 3);
    assert_eq!(report.mirrored, 3);
    assert_eq!(report.notified, 0);
    for inquiry in &stale {
        let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
        assert_eq!(stored.inquiry_status, InquiryState::Expired);
        assert_eq!(
            t.projection.status_of(inquiry.inquiry_uuid),
            Some(ProjectedStatus::Inquiry(InquiryState::Expired))
        );
    }
    let untouched = t.store.inquiry(fresh.inquiry_id).await.unwrap();
    assert_eq!(untouched.inquiry_status, InquiryState::Inquiring);

    // One batched projection call, no notifications
    assert!(matches!(
        t.projection.writes().as_slice(),
        [ProjectionWrite::Batch { entity_uuids, .. }] if entity_uuids.len() == 3
    ));
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_second_scan_finds_nothing() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    InquiryFactory::new(&guy).created_minutes_ago(60).create(&t.store).await;
    let now = Utc::now();

    let first = assert_ok!(scan_expired_inquiries(&t.context, now).await);
    let second = assert_ok!(scan_expired_inquiries(&t.context, now).await);

    assert_eq!(first.transitioned, 1);
    assert!(second.is_empty());
    assert_eq!(t.projection.write_count(), 1);
}

#[tokio::test]
async fn test_picked_up_inquiries_never_expire() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let asking = InquiryFactory::new(&guy)
        .with_status(InquiryState::Asking)
        .with_picker(&girl)
        .created_minutes_ago(120)
        .create(&t.store)
        .await;

    let report = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);

    assert!(report.is_empty());
    let stored = t.store.inquiry(asking.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Asking);
}

#[tokio::test]
async fn test_store_outage_is_reported_and_retried_next_tick() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let inquiry = InquiryFactory::new(&guy).created_minutes_ago(30).create(&t.store).await;

    t.store.set_unavailable(true);
    assert!(scan_expired_inquiries(&t.context, Utc::now()).await.is_err());

    t.store.set_unavailable(false);
    let report = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);
    assert_eq!(report.transitioned, 1);
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Expired);
}

#[tokio::test]
async fn test_failed_mirror_is_repaired_on_the_next_tick() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let inquiry = InquiryFactory::new(&guy).created_minutes_ago(30).create(&t.store).await;

    t.projection.set_failing(true);
    let first = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);
    assert_eq!(first.transitioned, 1);
    assert_eq!(first.mirrored, 0);
    assert_eq!(t.projection.status_of(inquiry.inquiry_uuid), None);

    t.projection.set_failing(false);
    let second = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);
    assert_eq!(second.selected, 0);
    assert_eq!(second.transitioned, 0);
    assert_eq!(second.mirrored, 1);
    assert_eq!(
        t.projection.status_of(inquiry.inquiry_uuid),
        Some(ProjectedStatus::Inquiry(InquiryState::Expired))
    );

    let third = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);
    assert!(third.is_empty());
    assert_eq!(t.projection.write_count(), 1);
}

#[tokio::test]
async fn test_failed_commit_leaves_rows_for_the_next_tick() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let inquiry = InquiryFactory::new(&guy).created_minutes_ago(30).create(&t.store).await;

    t.store.fail_next_commit();
    let err = scan_expired_inquiries(&t.context, Utc::now()).await.unwrap_err();
    assert_eq!(err.error_code(), "store_failure");
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Inquiring);
    assert_eq!(t.projection.write_count(), 0);

    let report = assert_ok!(scan_expired_inquiries(&t.context, Utc::now()).await);
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.mirrored, 1);
}
