use thiserror::Error;

/// Comprehensive error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid {entity} transition: event '{event}' is not accepted from state '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },

    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },
}

/// Specific error type for guard condition failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Actor {actor} is not allowed to {action}")]
    ActorNotPermitted { actor: String, action: String },

    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },
}

/// Raised when a stored status string matches no known state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind} state: {value}")]
pub struct InvalidStateError {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidStateError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl From<GuardError> for StateMachineError {
    fn from(err: GuardError) -> Self {
        Self::GuardFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

/// Helper function to create actor permission errors
pub fn actor_not_permitted(actor: impl ToString, action: impl Into<String>) -> GuardError {
    GuardError::ActorNotPermitted {
        actor: actor.to_string(),
        action: action.into(),
    }
}

/// Helper function to create business rule violations
pub fn business_rule_violation(rule: impl Into<String>) -> GuardError {
    GuardError::BusinessRuleViolation { rule: rule.into() }
}
