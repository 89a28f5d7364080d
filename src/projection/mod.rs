//! # Mirrored Projection
//!
//! Client-facing, eventually-consistent copy of inquiry and service status
//! plus a few display fields. The relational store owns the truth; the
//! projection is only ever written after a relational commit and may lag.
//!
//! Writes are idempotent: repeating an update with the same status leaves the
//! projection as it was.

pub mod pg_projection;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::{InquiryState, ServiceState};

pub use pg_projection::PgProjectionStore;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Projection database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Projection serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Projection store unavailable: {0}")]
    Unavailable(String),
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Projection collection a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionCollection {
    Inquiries,
    Services,
}

impl ProjectionCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiries => "inquiries",
            Self::Services => "services",
        }
    }
}

/// Status carried by a projection document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProjectedStatus {
    Inquiry(InquiryState),
    Service(ServiceState),
}

impl ProjectedStatus {
    pub fn collection(&self) -> ProjectionCollection {
        match self {
            Self::Inquiry(_) => ProjectionCollection::Inquiries,
            Self::Service(_) => ProjectionCollection::Services,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiry(state) => state.as_str(),
            Self::Service(state) => state.as_str(),
        }
    }
}

impl From<InquiryState> for ProjectedStatus {
    fn from(state: InquiryState) -> Self {
        Self::Inquiry(state)
    }
}

impl From<ServiceState> for ProjectedStatus {
    fn from(state: ServiceState) -> Self {
        Self::Service(state)
    }
}

/// Display fields shown next to the status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayFields {
    pub picker_name: Option<String>,
    pub channel_uuid: Option<Uuid>,
    pub service_uuid: Option<Uuid>,
}

/// A single-document projection write.
///
/// The display fields replace the stored ones, so callers always send the
/// full set that applies to the new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionUpdate {
    pub entity_uuid: Uuid,
    pub status: ProjectedStatus,
    #[serde(flatten)]
    pub display: DisplayFields,
}

impl ProjectionUpdate {
    pub fn new(entity_uuid: Uuid, status: impl Into<ProjectedStatus>) -> Self {
        Self {
            entity_uuid,
            status: status.into(),
            display: DisplayFields::default(),
        }
    }

    pub fn with_picker_name(mut self, picker_name: impl Into<String>) -> Self {
        self.display.picker_name = Some(picker_name.into());
        self
    }

    pub fn with_channel(mut self, channel_uuid: Uuid) -> Self {
        self.display.channel_uuid = Some(channel_uuid);
        self
    }

    pub fn with_service(mut self, service_uuid: Uuid) -> Self {
        self.display.service_uuid = Some(service_uuid);
        self
    }

    pub fn collection(&self) -> ProjectionCollection {
        self.status.collection()
    }
}

/// Document push store gateway
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Write one document's status and display fields
    async fn update_status(&self, update: &ProjectionUpdate) -> ProjectionResult<()>;

    /// Write the same status to many documents, leaving their display fields alone
    async fn update_multiple_status(
        &self,
        entity_uuids: &[Uuid],
        status: ProjectedStatus,
    ) -> ProjectionResult<()>;
}
