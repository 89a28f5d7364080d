use thiserror::Error;

use crate::database::StoreError;
use crate::state_machine::{GuardError, StateMachineError};

/// Typed error returned by every lifecycle use-case.
///
/// Client errors are never retried; `Store` is a server error for interactive
/// callers and a logged, retry-on-next-tick condition for schedulers.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Transition rejected: {0}")]
    TransitionRejected(#[from] StateMachineError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store failure: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for API surfaces
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransitionRejected(_) => "transition_rejected",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::Validation(_) => "validation_failed",
            Self::Store(_) => "store_failure",
            Self::Configuration(_) => "configuration_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Configuration(_))
    }
}

impl From<GuardError> for LifecycleError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::ActorNotPermitted { .. } => Self::Forbidden(err.to_string()),
            GuardError::BusinessRuleViolation { rule } => Self::Conflict(rule),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrentModification { .. } | StoreError::ConstraintViolation { .. } => {
                Self::Conflict(err.to_string())
            }
            other => Self::Store(other),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
