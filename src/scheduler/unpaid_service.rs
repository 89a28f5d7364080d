use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

use super::{ReconciliationScan, ScanReport};
use crate::error::{LifecycleError, LifecycleResult};
use crate::notifications::MessageKind;
use crate::orchestration::lifecycle_orchestrator::finish;
use crate::orchestration::propagation::{mirror_pending_services, notify_topics};
use crate::orchestration::LifecycleContext;
use crate::state_machine::{CancelCause, ServiceEvent, ServiceState, ServiceStateMachine};

/// Fail unpaid services booked longer ago than the payment window.
///
/// Both parties are notified for every service that moved, then every
/// failed service the projection has not caught up with is mirrored in one
/// call.
pub async fn scan_unpaid_expired_services(
    context: &LifecycleContext,
    now: DateTime<Utc>,
) -> LifecycleResult<ScanReport> {
    let source = ServiceState::Unpaid;
    let target = ServiceStateMachine::determine_target_state(source, ServiceEvent::PayFailed)?;

    let booked_before = now - context.policy.payment_window();
    let candidates = context
        .store
        .select_unpaid_expired_services(booked_before)
        .await?;
    let mut report = ScanReport {
        selected: candidates.len(),
        ..ScanReport::default()
    };

    if !candidates.is_empty() {
        let ids: Vec<i64> = candidates.iter().map(|service| service.service_id).collect();
        let mut tx = context.store.begin().await?;
        let outcome = tx
            .bulk_transition_services(&ids, source, target, Some(CancelCause::PaymentFailed))
            .await
            .map_err(LifecycleError::from);
        let moved = finish(tx, outcome).await?;

        info!(
            selected = candidates.len(),
            transitioned = moved.len(),
            "Failed unpaid services past the payment window"
        );

        // Only services this tick actually moved get notified
        let moved_set: HashSet<_> = moved.iter().copied().collect();
        for service in candidates
            .iter()
            .filter(|service| moved_set.contains(&service.service_uuid))
        {
            report.notified += notify_topics(
                context,
                &service.topics(),
                MessageKind::PaymentFailed,
                json!({
                    "service_uuid": service.service_uuid,
                    "status": target,
                    "cancel_cause": CancelCause::PaymentFailed,
                }),
            )
            .await;
        }
        report.transitioned = moved.len();
    }

    report.mirrored = mirror_pending_services(context, target).await;
    Ok(report)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnpaidServiceScanner;

#[async_trait]
impl ReconciliationScan for UnpaidServiceScanner {
    fn name(&self) -> &'static str {
        "unpaid_service"
    }

    async fn scan(&self, context: &LifecycleContext, now: DateTime<Utc>) -> LifecycleResult<ScanReport> {
        scan_unpaid_expired_services(context, now).await
    }
}
