//! Post-commit propagation to the projection store and the notifier.
//!
//! Callers only get here once the relational commit succeeded. Every failure
//! is logged at `warn` and swallowed: the relational row stays authoritative
//! and the next use-case or scheduler tick re-mirrors it.
//!
//! An accepted write is recorded on the relational row (`projected_status`),
//! which is how the schedulers find rows whose mirror is still behind.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::context::LifecycleContext;
use crate::notifications::MessageKind;
use crate::projection::{ProjectedStatus, ProjectionUpdate};
use crate::state_machine::{InquiryState, ServiceState};

/// Remember which status the projection now holds
async fn record_projected(
    context: &LifecycleContext,
    entity_uuids: &[Uuid],
    status: ProjectedStatus,
) {
    if let Err(e) = context.store.mark_projected(entity_uuids, status).await {
        warn!(
            count = entity_uuids.len(),
            status = status.as_str(),
            error = %e,
            "Failed to record projected status"
        );
    }
}

/// Mirror one document. Returns whether the write landed.
pub async fn mirror(context: &LifecycleContext, update: ProjectionUpdate) -> bool {
    match context.projection.update_status(&update).await {
        Ok(()) => {
            record_projected(context, &[update.entity_uuid], update.status).await;
            true
        }
        Err(e) => {
            warn!(
                entity_uuid = %update.entity_uuid,
                status = update.status.as_str(),
                error = %e,
                "Projection write failed after commit"
            );
            false
        }
    }
}

/// Mirror a batch in one call. Returns how many documents were written.
pub async fn mirror_batch(
    context: &LifecycleContext,
    entity_uuids: &[Uuid],
    status: ProjectedStatus,
) -> usize {
    if entity_uuids.is_empty() {
        return 0;
    }
    match context
        .projection
        .update_multiple_status(entity_uuids, status)
        .await
    {
        Ok(()) => {
            record_projected(context, entity_uuids, status).await;
            entity_uuids.len()
        }
        Err(e) => {
            warn!(
                count = entity_uuids.len(),
                status = status.as_str(),
                error = %e,
                "Batched projection write failed after commit"
            );
            0
        }
    }
}

/// Mirror every inquiry in `status` whose projection is behind
pub async fn mirror_pending_inquiries(context: &LifecycleContext, status: InquiryState) -> usize {
    match context.store.select_unmirrored_inquiries(status).await {
        Ok(pending) => mirror_batch(context, &pending, status.into()).await,
        Err(e) => {
            warn!(status = status.as_str(), error = %e, "Failed to select unmirrored inquiries");
            0
        }
    }
}

/// Mirror every service in `status` whose projection is behind
pub async fn mirror_pending_services(context: &LifecycleContext, status: ServiceState) -> usize {
    match context.store.select_unmirrored_services(status).await {
        Ok(pending) => mirror_batch(context, &pending, status.into()).await,
        Err(e) => {
            warn!(status = status.as_str(), error = %e, "Failed to select unmirrored services");
            0
        }
    }
}

/// Publish the same message to every topic. Returns how many publishes succeeded.
pub async fn notify_topics(
    context: &LifecycleContext,
    topics: &[String],
    kind: MessageKind,
    payload: Value,
) -> usize {
    let publishes = topics.iter().map(|topic| {
        let payload = payload.clone();
        async move {
            match context.notifier.publish(topic, kind, payload).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(topic = %topic, kind = %kind, error = %e, "Notification dispatch failed");
                    false
                }
            }
        }
    });

    join_all(publishes)
        .await
        .into_iter()
        .filter(|sent| *sent)
        .count()
}

/// Notify a user by id, if they registered a push topic
pub async fn notify_user(
    context: &LifecycleContext,
    user_id: i64,
    kind: MessageKind,
    payload: Value,
) -> usize {
    let user = match context.store.find_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user_id, kind = %kind, "Notification recipient no longer exists");
            return 0;
        }
        Err(e) => {
            warn!(user_id, kind = %kind, error = %e, "Failed to load notification recipient");
            return 0;
        }
    };

    match user.topic() {
        Some(topic) => notify_topics(context, &[topic.to_string()], kind, payload).await,
        None => {
            debug!(user_id, kind = %kind, "Recipient has no push topic, skipping");
            0
        }
    }
}
