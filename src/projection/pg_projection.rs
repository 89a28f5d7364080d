//! Projection store backed by the `lifecycle_projections` table.
//!
//! Each write upserts the document and publishes it on the
//! `lifecycle_projection` channel inside one transaction, so listeners only
//! hear about rows that are actually visible.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ProjectedStatus, ProjectionResult, ProjectionStore, ProjectionUpdate};
use crate::constants::channels;

/// Uuids per NOTIFY payload; keeps batch payloads well under the 8000 byte limit
const NOTIFY_CHUNK_SIZE: usize = 100;

#[derive(Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl std::fmt::Debug for PgProjectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgProjectionStore")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PgProjectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectionStore for PgProjectionStore {
    #[instrument(skip(self, update), fields(entity_uuid = %update.entity_uuid, status = update.status.as_str()))]
    async fn update_status(&self, update: &ProjectionUpdate) -> ProjectionResult<()> {
        let collection = update.collection();
        let payload = serde_json::to_string(&json!({
            "collection": collection,
            "document": update,
        }))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO lifecycle_projections \
                 (collection, entity_uuid, status, picker_name, channel_uuid, service_uuid, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             ON CONFLICT (collection, entity_uuid) DO UPDATE \
             SET status = EXCLUDED.status, \
                 picker_name = EXCLUDED.picker_name, \
                 channel_uuid = EXCLUDED.channel_uuid, \
                 service_uuid = EXCLUDED.service_uuid, \
                 updated_at = NOW()",
        )
        .bind(collection.as_str())
        .bind(update.entity_uuid)
        .bind(update.status.as_str())
        .bind(update.display.picker_name.as_deref())
        .bind(update.display.channel_uuid)
        .bind(update.display.service_uuid)
        .execute(&mut *tx)
        .await?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channels::PROJECTION)
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Projection document updated");
        Ok(())
    }

    #[instrument(skip(self, entity_uuids), fields(count = entity_uuids.len(), status = status.as_str()))]
    async fn update_multiple_status(
        &self,
        entity_uuids: &[Uuid],
        status: ProjectedStatus,
    ) -> ProjectionResult<()> {
        if entity_uuids.is_empty() {
            return Ok(());
        }
        let collection = status.collection();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO lifecycle_projections (collection, entity_uuid, status, updated_at) \
             SELECT $1, entity_uuid, $3, NOW() FROM UNNEST($2::UUID[]) AS entity_uuid \
             ON CONFLICT (collection, entity_uuid) DO UPDATE \
             SET status = EXCLUDED.status, updated_at = NOW()",
        )
        .bind(collection.as_str())
        .bind(entity_uuids)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        for chunk in entity_uuids.chunks(NOTIFY_CHUNK_SIZE) {
            let payload = serde_json::to_string(&json!({
                "collection": collection,
                "entity_uuids": chunk,
                "status": status,
            }))?;
            sqlx::query("SELECT pg_notify($1, $2)")
                .bind(channels::PROJECTION)
                .bind(&payload)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Projection batch updated");
        Ok(())
    }
}
