use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::state_machine::errors::InvalidStateError;

/// Marketplace role of a user.
///
/// Customers raise inquiries and pay for services; providers pick
/// inquiries up and deliver the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Provider,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = InvalidStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "provider" => Ok(Self::Provider),
            _ => Err(InvalidStateError::new("user role", s)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = InvalidStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Maps to the `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub user_uuid: Uuid,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    /// Wallet balance in minor currency units
    pub balance: i64,
    /// Push topic registered by the user's device, absent until they opt in
    pub push_topic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Notification topic for this user, if one is registered
    pub fn topic(&self) -> Option<&str> {
        self.push_topic.as_deref().filter(|topic| !topic.is_empty())
    }

    pub fn is_provider(&self) -> bool {
        self.role == UserRole::Provider
    }
}
