// Test Helpers Module - in-memory collaborators for lifecycle tests
//
// Lets unit and integration tests drive the orchestrator and schedulers
// without a live PostgreSQL instance.

pub mod factories;
pub mod in_memory_store;
pub mod recording;

use std::sync::Arc;

use crate::config::LifecyclePolicy;
use crate::orchestration::{LifecycleContext, LifecycleOrchestrator};

pub use factories::{customer, provider, InquiryFactory, ServiceFactory, DEFAULT_BALANCE};
pub use in_memory_store::{InMemoryLifecycleStore, StoreState};
pub use recording::{ProjectionWrite, RecordingNotifier, RecordingProjectionStore};

/// In-memory collaborators wired into one context
pub struct TestLifecycle {
    pub store: Arc<InMemoryLifecycleStore>,
    pub projection: Arc<RecordingProjectionStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub context: LifecycleContext,
}

impl TestLifecycle {
    pub fn new() -> Self {
        Self::with_policy(LifecyclePolicy::default())
    }

    pub fn with_policy(policy: LifecyclePolicy) -> Self {
        let store = Arc::new(InMemoryLifecycleStore::new());
        let projection = Arc::new(RecordingProjectionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let context = LifecycleContext::new(
            store.clone(),
            projection.clone(),
            notifier.clone(),
            policy,
        );
        Self {
            store,
            projection,
            notifier,
            context,
        }
    }

    pub fn orchestrator(&self) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(self.context.clone())
    }
}

impl Default for TestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
