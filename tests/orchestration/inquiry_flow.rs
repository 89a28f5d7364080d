use rendezvous_core::error::LifecycleError;
use rendezvous_core::notifications::MessageKind;
use rendezvous_core::projection::ProjectedStatus;
use rendezvous_core::state_machine::{InquiryState, ServiceState};
use rendezvous_core::test_helpers::{customer, provider, TestLifecycle};
use tokio_test::{assert_err, assert_ok};

use super::{new_inquiry, terms};

#[tokio::test]
async fn test_create_inquiry_mirrors_without_notifying() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;

    let inquiry = assert_ok!(t.orchestrator().create_inquiry(guy.user_uuid, new_inquiry()).await);

    assert_eq!(inquiry.inquiry_status, InquiryState::Inquiring);
    assert_eq!(inquiry.inquirer_id, guy.user_id);
    assert_eq!(
        inquiry.expired_at - inquiry.created_at,
        t.context.policy.inquiry_ttl()
    );
    assert_eq!(
        t.projection.status_of(inquiry.inquiry_uuid),
        Some(ProjectedStatus::Inquiry(InquiryState::Inquiring))
    );
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_second_active_inquiry_conflicts() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let orchestrator = t.orchestrator();

    let first = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    let err = assert_err!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert!(matches!(err, LifecycleError::Conflict(_)));
    assert_eq!(t.store.snapshot().await.inquiries.len(), 1);

    // Once the first one is terminal a new inquiry is allowed
    assert_ok!(orchestrator.cancel(first.inquiry_uuid, guy.user_uuid).await);
    assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
}

#[tokio::test]
async fn test_create_inquiry_rejects_bad_input() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;

    let mut input = new_inquiry();
    input.budget = 0;
    let err = assert_err!(t.orchestrator().create_inquiry(guy.user_uuid, input).await);

    assert_eq!(err.error_code(), "validation_failed");
    assert!(t.store.snapshot().await.inquiries.is_empty());
}

#[tokio::test]
async fn test_pickup_records_picker_and_notifies_requester() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);

    let picked = assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert_eq!(picked.inquiry_status, InquiryState::Asking);
    assert_eq!(picked.picker_id, Some(girl.user_id));
    let update = t.projection.last_update(inquiry.inquiry_uuid).unwrap();
    assert_eq!(update.display.picker_name.as_deref(), Some("girl"));

    let sent = t.notifier.sent_to("topic-guy");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::InquiryPickedUp);
    assert_eq!(sent[0].payload["picker_name"], "girl");
}

#[tokio::test]
async fn test_only_providers_other_than_requester_pick_up() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let other_guy = customer(&t.store, "other").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    let writes_before = t.projection.write_count();

    let err = assert_err!(orchestrator.pickup(inquiry.inquiry_uuid, other_guy.user_uuid).await);

    assert!(matches!(err, LifecycleError::Forbidden(_)));
    assert!(err.is_client_error());
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Inquiring);
    assert_eq!(t.projection.write_count(), writes_before);
    assert_eq!(t.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_non_requester_cannot_agree_or_cancel() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);

    let err = assert_err!(orchestrator.cancel(inquiry.inquiry_uuid, girl.user_uuid).await);
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);
    let err = assert_err!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, girl.user_uuid).await);
    assert!(matches!(err, LifecycleError::Forbidden(_)));
}

#[tokio::test]
async fn test_cancel_after_pickup_is_rejected() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    let err = assert_err!(orchestrator.cancel(inquiry.inquiry_uuid, guy.user_uuid).await);

    assert_eq!(err.error_code(), "transition_rejected");
    let stored = t.store.inquiry(inquiry.inquiry_id).await.unwrap();
    assert_eq!(stored.inquiry_status, InquiryState::Asking);
}

#[tokio::test]
async fn test_skip_reopens_and_restarts_expiry() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    let reopened = assert_ok!(orchestrator.skip(inquiry.inquiry_uuid, guy.user_uuid).await);

    assert_eq!(reopened.inquiry_status, InquiryState::Inquiring);
    assert_eq!(reopened.picker_id, None);
    assert!(reopened.expired_at >= inquiry.expired_at);
    assert_eq!(
        t.projection.status_of(inquiry.inquiry_uuid),
        Some(ProjectedStatus::Inquiry(InquiryState::Inquiring))
    );

    let to_girl = t.notifier.sent_to("topic-girl");
    assert_eq!(to_girl.len(), 1);
    assert_eq!(to_girl[0].kind, MessageKind::InquirySkipped);
}

#[tokio::test]
async fn test_agree_to_chat_opens_room_and_derives_service() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);

    let started = assert_ok!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, guy.user_uuid).await);

    assert_eq!(started.inquiry.inquiry_status, InquiryState::Chatting);
    assert_eq!(started.service.service_status, ServiceState::Negotiating);
    assert_eq!(started.service.customer_id, guy.user_id);
    assert_eq!(started.service.provider_id, girl.user_id);
    assert!(started.chat_room.is_open());

    let snapshot = t.store.snapshot().await;
    let members: Vec<i64> = snapshot
        .chat_room_members
        .iter()
        .filter(|(room_id, _)| *room_id == started.chat_room.chat_room_id)
        .map(|(_, user_id)| *user_id)
        .collect();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&guy.user_id) && members.contains(&girl.user_id));

    let update = t.projection.last_update(inquiry.inquiry_uuid).unwrap();
    assert_eq!(update.display.channel_uuid, Some(started.chat_room.channel_uuid));
    assert_eq!(update.display.service_uuid, Some(started.service.service_uuid));
    assert_eq!(update.display.picker_name.as_deref(), Some("girl"));
    assert_eq!(
        t.projection.status_of(started.service.service_uuid),
        Some(ProjectedStatus::Service(ServiceState::Negotiating))
    );
    assert!(t.notifier.kinds().contains(&MessageKind::ChatStarted));
}

#[tokio::test]
async fn test_revert_chat_reopens_and_allows_a_new_service() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let second = provider(&t.store, "second").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);
    let first_chat = assert_ok!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, guy.user_uuid).await);

    let reopened = assert_ok!(orchestrator.revert_chat(inquiry.inquiry_uuid, girl.user_uuid).await);

    assert_eq!(reopened.inquiry_status, InquiryState::Inquiring);
    assert_eq!(reopened.picker_id, None);
    let abandoned = t.store.service(first_chat.service.service_id).await.unwrap();
    assert_eq!(abandoned.service_status, ServiceState::Canceled);
    let snapshot = t.store.snapshot().await;
    assert!(!snapshot.chat_rooms[&first_chat.chat_room.chat_room_id].is_open());
    assert_eq!(
        t.notifier.sent_to("topic-guy").last().map(|n| n.kind),
        Some(MessageKind::ChatReverted)
    );

    // A different provider can take it from here
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, second.user_uuid).await);
    let second_chat = assert_ok!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, guy.user_uuid).await);
    assert_ne!(second_chat.service.service_uuid, first_chat.service.service_uuid);
    assert_eq!(second_chat.service.provider_id, second.user_id);
}

#[tokio::test]
async fn test_book_moves_inquiry_and_service_together() {
    let t = TestLifecycle::new();
    let guy = customer(&t.store, "guy").await;
    let girl = provider(&t.store, "girl").await;
    let orchestrator = t.orchestrator();
    let inquiry = assert_ok!(orchestrator.create_inquiry(guy.user_uuid, new_inquiry()).await);
    assert_ok!(orchestrator.pickup(inquiry.inquiry_uuid, girl.user_uuid).await);
    let chat = assert_ok!(orchestrator.agree_to_chat(inquiry.inquiry_uuid, guy.user_uuid).await);

    // The requester cannot set the terms
    let err = assert_err!(orchestrator.book(inquiry.inquiry_uuid, guy.user_uuid, terms(2_000)).await);
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let agreed = terms(2_000);
    let booking = assert_ok!(orchestrator.book(inquiry.inquiry_uuid, girl.user_uuid, agreed.clone()).await);

    assert_eq!(booking.inquiry.inquiry_status, InquiryState::Booked);
    assert_eq!(booking.service.service_uuid, chat.service.service_uuid);
    assert_eq!(booking.service.service_status, ServiceState::Unpaid);
    assert_eq!(booking.service.price, Some(2_000));
    assert_eq!(booking.service.appointment_time, agreed.appointment_time);
    assert_eq!(booking.service.start_time, Some(agreed.appointment_time));
    assert_eq!(
        booking.service.end_time,
        Some(agreed.appointment_time + chrono::Duration::minutes(60))
    );
    assert!(booking.service.booked_at.is_some());

    let service_update = t.projection.last_update(booking.service.service_uuid).unwrap();
    assert_eq!(service_update.display.channel_uuid, Some(chat.chat_room.channel_uuid));
    assert_eq!(t.notifier.sent_to("topic-guy").last().map(|n| n.kind), Some(MessageKind::ServiceBooked));
    assert_eq!(t.notifier.sent_to("topic-girl").last().map(|n| n.kind), Some(MessageKind::ServiceBooked));
}

#[tokio::test]
async fn test_unknown_inquiry_is_not_found() {
    let t = TestLifecycle::new();
    let girl = provider(&t.store, "girl").await;

    let err = assert_err!(t.orchestrator().pickup(uuid::Uuid::new_v4(), girl.user_uuid).await);

    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert_eq!(err.error_code(), "not_found");
}
