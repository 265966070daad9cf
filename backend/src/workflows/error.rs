// Workflow Errors - Business and infrastructure failures raised by the automation core

use thiserror::Error;

use crate::repositories::StoreError;

/// Failure of a single dispatched action. Never aborts sibling actions or rules.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    /// Action config is missing a key or carries a malformed value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The messaging collaborator or webhook target did not accept the delivery.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Referenced entity, campaign or template does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// Action did not finish within the per-action time budget.
    #[error("action timed out after {0}s")]
    Timeout(u64),

    /// Backing store failed while executing the action.
    #[error("store error: {0}")]
    Store(String),
}

impl ActionError {
    pub fn missing(key: &str) -> Self {
        Self::Configuration(format!("missing '{}'", key))
    }

    pub fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Configuration(format!("invalid '{}': {}", key, reason))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::NotFound { .. } => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other.to_string()),
        }
    }
}

/// A condition whose operands cannot be compared. Evaluates as false.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("operator '{operator}' cannot compare {left} with {right}")]
    Uncomparable {
        operator: &'static str,
        left: String,
        right: String,
    },
}

/// Infrastructure failure surfaced to the caller of `process_trigger`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}
