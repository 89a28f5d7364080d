use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{ReconciliationScan, ScanReport};
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::ServiceParties;
use crate::orchestration::lifecycle_orchestrator::finish;
use crate::orchestration::propagation::mirror_pending_services;
use crate::orchestration::LifecycleContext;
use crate::state_machine::{ServiceEvent, ServiceState, ServiceStateMachine};

/// Bulk-move the selected services, then mirror every service in the
/// target status the projection has not caught up with
async fn transition_batch(
    context: &LifecycleContext,
    candidates: Vec<ServiceParties>,
    source: ServiceState,
    event: ServiceEvent,
) -> LifecycleResult<ScanReport> {
    let target = ServiceStateMachine::determine_target_state(source, event)?;
    let mut report = ScanReport {
        selected: candidates.len(),
        ..ScanReport::default()
    };

    if !candidates.is_empty() {
        let ids: Vec<i64> = candidates.iter().map(|service| service.service_id).collect();
        let mut tx = context.store.begin().await?;
        let outcome = tx
            .bulk_transition_services(&ids, source, target, None)
            .await
            .map_err(LifecycleError::from);
        let moved = finish(tx, outcome).await?;

        info!(
            from = %source,
            to = %target,
            selected = candidates.len(),
            transitioned = moved.len(),
            "Reconciled service status"
        );
        report.transitioned = moved.len();
    }

    report.mirrored = mirror_pending_services(context, target).await;
    Ok(report)
}

/// Expire paid services that never started within the start buffer
pub async fn scan_unstarted_services(
    context: &LifecycleContext,
    now: DateTime<Utc>,
) -> LifecycleResult<ScanReport> {
    let started_before = now - context.policy.start_buffer();
    let candidates = context.store.select_unstarted_services(started_before).await?;
    transition_batch(context, candidates, ServiceState::ToBeFulfilled, ServiceEvent::Expired).await
}

/// Complete services whose end time has passed
pub async fn scan_finished_services(
    context: &LifecycleContext,
    now: DateTime<Utc>,
) -> LifecycleResult<ScanReport> {
    let candidates = context.store.select_finished_services(now).await?;
    transition_batch(context, candidates, ServiceState::Fulfilling, ServiceEvent::Complete).await
}

/// Run both service queries. Each is attempted even if the other fails.
pub async fn scan_service_status(
    context: &LifecycleContext,
    now: DateTime<Utc>,
) -> LifecycleResult<ScanReport> {
    let expired = scan_unstarted_services(context, now).await;
    let completed = scan_finished_services(context, now).await;
    Ok(expired? + completed?)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceStatusScanner;

#[async_trait]
impl ReconciliationScan for ServiceStatusScanner {
    fn name(&self) -> &'static str {
        "service_status"
    }

    async fn scan(&self, context: &LifecycleContext, now: DateTime<Utc>) -> LifecycleResult<ScanReport> {
        scan_service_status(context, now).await
    }
}
