//! Recording projection store and notifier with failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::notifications::{MessageKind, Notification, Notifier, NotifyError, NotifyResult};
use crate::projection::{
    ProjectedStatus, ProjectionError, ProjectionResult, ProjectionStore, ProjectionUpdate,
};

/// One accepted projection call
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionWrite {
    Single(ProjectionUpdate),
    Batch {
        entity_uuids: Vec<Uuid>,
        status: ProjectedStatus,
    },
}

#[derive(Debug, Default)]
pub struct RecordingProjectionStore {
    writes: Mutex<Vec<ProjectionWrite>>,
    failing: AtomicBool,
    failed_attempts: AtomicUsize,
}

impl RecordingProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<ProjectionWrite> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    /// Latest mirrored status of a document
    pub fn status_of(&self, entity_uuid: Uuid) -> Option<ProjectedStatus> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find_map(|write| match write {
                ProjectionWrite::Single(update) if update.entity_uuid == entity_uuid => {
                    Some(update.status)
                }
                ProjectionWrite::Batch {
                    entity_uuids,
                    status,
                } if entity_uuids.contains(&entity_uuid) => Some(*status),
                _ => None,
            })
    }

    /// Latest single-document write for an entity
    pub fn last_update(&self, entity_uuid: Uuid) -> Option<ProjectionUpdate> {
        self.writes.lock().iter().rev().find_map(|write| match write {
            ProjectionWrite::Single(update) if update.entity_uuid == entity_uuid => {
                Some(update.clone())
            }
            _ => None,
        })
    }

    fn check_failing(&self) -> ProjectionResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_attempts.fetch_add(1, Ordering::SeqCst);
            return Err(ProjectionError::Unavailable("injected projection failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for RecordingProjectionStore {
    async fn update_status(&self, update: &ProjectionUpdate) -> ProjectionResult<()> {
        self.check_failing()?;
        self.writes.lock().push(ProjectionWrite::Single(update.clone()));
        Ok(())
    }

    async fn update_multiple_status(
        &self,
        entity_uuids: &[Uuid],
        status: ProjectedStatus,
    ) -> ProjectionResult<()> {
        self.check_failing()?;
        self.writes.lock().push(ProjectionWrite::Batch {
            entity_uuids: entity_uuids.to_vec(),
            status,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent_to(&self, topic: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|notification| notification.topic == topic)
            .cloned()
            .collect()
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.sent.lock().iter().map(|notification| notification.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, kind: MessageKind, payload: Value) -> NotifyResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("injected notifier failure".to_string()));
        }
        self.sent.lock().push(Notification::new(topic, kind, payload));
        Ok(())
    }
}
