use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Chat room opened when a requester agrees to chat with a picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatRoom {
    pub chat_room_id: i64,
    pub channel_uuid: Uuid,
    pub inquiry_id: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatRoom {
    pub fn is_open(&self) -> bool {
        self.deleted_at.is_none()
    }
}
