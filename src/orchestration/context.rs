use std::sync::Arc;

use crate::config::LifecyclePolicy;
use crate::database::{LifecycleStore, PgLifecycleStore};
use crate::notifications::{DbNotifier, Notifier};
use crate::projection::{PgProjectionStore, ProjectionStore};

/// Collaborators shared by the orchestrator and the schedulers.
///
/// Every component receives its gateways through this context; there are no
/// process-wide handles. Cloning is cheap.
#[derive(Clone)]
pub struct LifecycleContext {
    /// Relational system of record
    pub store: Arc<dyn LifecycleStore>,

    /// Client-facing status mirror
    pub projection: Arc<dyn ProjectionStore>,

    /// Push notification gateway
    pub notifier: Arc<dyn Notifier>,

    pub policy: LifecyclePolicy,
}

impl std::fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("store", &"Arc<dyn LifecycleStore>")
            .field("projection", &"Arc<dyn ProjectionStore>")
            .field("notifier", &"Arc<dyn Notifier>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl LifecycleContext {
    pub fn new(
        store: Arc<dyn LifecycleStore>,
        projection: Arc<dyn ProjectionStore>,
        notifier: Arc<dyn Notifier>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            projection,
            notifier,
            policy,
        }
    }

    /// Wire the PostgreSQL-backed collaborators over one shared pool
    pub fn from_pool(pool: sqlx::PgPool, policy: LifecyclePolicy) -> Self {
        Self::new(
            Arc::new(PgLifecycleStore::new(pool.clone())),
            Arc::new(PgProjectionStore::new(pool.clone())),
            Arc::new(DbNotifier::new(pool)),
            policy,
        )
    }
}
