//! # Reconciliation Schedulers
//!
//! Three periodic jobs that find rows whose time-based condition silently
//! became true, apply the transition in bulk, and propagate it like the
//! orchestrator does:
//!
//! - [`inquiry_expiry`] - open inquiries past their TTL become `expired`
//! - [`unpaid_service`] - unpaid services past the payment window become `payment_failed`
//! - [`service_status`] - unstarted services expire, finished ones complete
//!
//! Each selection predicate excludes rows already in the destination status,
//! and every bulk update is conditional on the source status, so a duplicated
//! or missed tick never transitions a row twice. Failures are logged; the next
//! tick re-selects whatever is still unreconciled. That includes rows already
//! in a destination status whose projection write never landed: every tick
//! re-mirrors them without transitioning them again.

pub mod inquiry_expiry;
pub mod service_status;
pub mod unpaid_service;

use std::ops::Add;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::error::LifecycleResult;
use crate::orchestration::LifecycleContext;

pub use inquiry_expiry::{scan_expired_inquiries, InquiryExpiryScanner};
pub use service_status::{
    scan_finished_services, scan_service_status, scan_unstarted_services, ServiceStatusScanner,
};
pub use unpaid_service::{scan_unpaid_expired_services, UnpaidServiceScanner};

/// Outcome of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Rows matching the selection predicate
    pub selected: usize,
    /// Rows the conditional bulk update actually moved
    pub transitioned: usize,
    /// Documents written to the projection store
    pub mirrored: usize,
    /// Notifications dispatched
    pub notified: usize,
}

impl ScanReport {
    /// Nothing selected and nothing re-mirrored
    pub fn is_empty(&self) -> bool {
        self.selected == 0 && self.mirrored == 0
    }
}

impl Add for ScanReport {
    type Output = ScanReport;

    fn add(self, other: ScanReport) -> ScanReport {
        ScanReport {
            selected: self.selected + other.selected,
            transitioned: self.transitioned + other.transitioned,
            mirrored: self.mirrored + other.mirrored,
            notified: self.notified + other.notified,
        }
    }
}

/// One reconciliation job
#[async_trait]
pub trait ReconciliationScan: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, context: &LifecycleContext, now: DateTime<Utc>) -> LifecycleResult<ScanReport>;
}

/// Tick `scanner` every `period` until `token` is cancelled.
///
/// Cancellation is only observed between ticks, so a running scan always
/// finishes its batch before the loop exits.
pub async fn run_scanner(
    scanner: Arc<dyn ReconciliationScan>,
    context: LifecycleContext,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        scanner = scanner.name(),
        interval_secs = period.as_secs(),
        "Reconciliation scheduler started"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(scanner = scanner.name(), "Reconciliation scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                match scanner.scan(&context, Utc::now()).await {
                    Ok(report) if report.is_empty() => {
                        debug!(scanner = scanner.name(), "Nothing to reconcile");
                    }
                    Ok(report) => {
                        info!(
                            scanner = scanner.name(),
                            selected = report.selected,
                            transitioned = report.transitioned,
                            mirrored = report.mirrored,
                            notified = report.notified,
                            "Reconciliation tick completed"
                        );
                    }
                    Err(e) => {
                        error!(scanner = scanner.name(), error = %e, "Reconciliation tick failed");
                    }
                }
            }
        }
    }
}

/// The three schedulers running as independent tasks under one token
#[derive(Debug)]
pub struct SchedulerSet {
    token: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerSet {
    pub fn spawn(context: LifecycleContext, config: &SchedulerConfig, token: CancellationToken) -> Self {
        let scanners: [(Arc<dyn ReconciliationScan>, Duration); 3] = [
            (Arc::new(InquiryExpiryScanner), config.inquiry_expiry_tick()),
            (Arc::new(UnpaidServiceScanner), config.unpaid_service_tick()),
            (Arc::new(ServiceStatusScanner), config.service_status_tick()),
        ];
        Self::spawn_scanners(context, scanners, token)
    }

    /// Run each scanner on its own period under a child of `token`
    pub fn spawn_scanners(
        context: LifecycleContext,
        scanners: impl IntoIterator<Item = (Arc<dyn ReconciliationScan>, Duration)>,
        token: CancellationToken,
    ) -> Self {
        let handles = scanners
            .into_iter()
            .map(|(scanner, period)| {
                let name = scanner.name();
                let handle = tokio::spawn(run_scanner(
                    scanner,
                    context.clone(),
                    period,
                    token.child_token(),
                ));
                (name, handle)
            })
            .collect();

        Self { token, handles }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel every loop and wait for the in-flight ticks to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(scanner = name, error = %e, "Scheduler task ended abnormally");
            }
        }
        info!("All reconciliation schedulers stopped");
    }
}
