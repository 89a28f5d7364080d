use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{ReconciliationScan, ScanReport};
use crate::error::{LifecycleError, LifecycleResult};
use crate::orchestration::lifecycle_orchestrator::finish;
use crate::orchestration::propagation::mirror_pending_inquiries;
use crate::orchestration::LifecycleContext;
use crate::state_machine::{InquiryEvent, InquiryState, InquiryStateMachine};

/// Expire open inquiries whose TTL ran out by `now`.
///
/// Expiry is only mirrored; nobody is notified. Expired inquiries whose
/// projection write failed on an earlier tick are mirrored again.
pub async fn scan_expired_inquiries(
    context: &LifecycleContext,
    now: DateTime<Utc>,
) -> LifecycleResult<ScanReport> {
    let source = InquiryState::Inquiring;
    let target = InquiryStateMachine::determine_target_state(source, InquiryEvent::Expire)?;

    let candidates = context.store.select_expired_inquiries(now).await?;
    let mut report = ScanReport {
        selected: candidates.len(),
        ..ScanReport::default()
    };

    if !candidates.is_empty() {
        let ids: Vec<i64> = candidates.iter().map(|inquiry| inquiry.inquiry_id).collect();
        let mut tx = context.store.begin().await?;
        let outcome = tx
            .bulk_transition_inquiries(&ids, source, target)
            .await
            .map_err(LifecycleError::from);
        let moved = finish(tx, outcome).await?;

        info!(
            selected = candidates.len(),
            transitioned = moved.len(),
            "Expired stale inquiries"
        );
        report.transitioned = moved.len();
    }

    report.mirrored = mirror_pending_inquiries(context, target).await;
    Ok(report)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InquiryExpiryScanner;

#[async_trait]
impl ReconciliationScan for InquiryExpiryScanner {
    fn name(&self) -> &'static str {
        "inquiry_expiry"
    }

    async fn scan(&self, context: &LifecycleContext, now: DateTime<Utc>) -> LifecycleResult<ScanReport> {
        scan_expired_inquiries(context, now).await
    }
}
