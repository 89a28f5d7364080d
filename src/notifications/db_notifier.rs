use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

use super::{MessageKind, Notification, Notifier, NotifyError, NotifyResult};
use crate::constants::channels;

/// PostgreSQL caps NOTIFY payloads just under 8000 bytes
const MAX_PAYLOAD_SIZE: usize = 7_900;

/// Database-backed notifier using `pg_notify`.
///
/// Every message goes to one channel with the topic inside the payload; the
/// push gateway listening on that channel fans it out to devices.
pub struct DbNotifier {
    pool: PgPool,
    channel: String,
}

impl std::fmt::Debug for DbNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbNotifier")
            .field("channel", &self.channel)
            .field("pool", &"PgPool")
            .finish()
    }
}

impl DbNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self::with_channel(pool, channels::NOTIFICATIONS)
    }

    pub fn with_channel(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    fn build_payload(notification: &Notification) -> NotifyResult<String> {
        let payload = serde_json::to_string(notification)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(NotifyError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(payload)
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    #[instrument(skip(self, payload), fields(channel = %self.channel, kind = %kind))]
    async fn publish(&self, topic: &str, kind: MessageKind, payload: Value) -> NotifyResult<()> {
        let payload = Self::build_payload(&Notification::new(topic, kind, payload))?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send notification");
                NotifyError::Database(e)
            })?;

        debug!("Notification sent");
        Ok(())
    }
}
