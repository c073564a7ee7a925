use thiserror::Error;

use crate::core::client::authz::ClusterResource;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{resource} {verbs} not authorized")]
    Unauthorized {
        resource: ClusterResource,
        verbs: String,
    },

    #[error("failed to check authorization: {0}")]
    AuthorizationCheck(String),

    #[error("{resource} source unavailable: {reason}")]
    SourceUnavailable {
        resource: ClusterResource,
        reason: String,
    },

    #[error("metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether a refresh cycle hitting this error should simply be retried on the next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Unauthorized { .. } | EngineError::Config(_) => false,
            EngineError::AuthorizationCheck(_)
            | EngineError::SourceUnavailable { .. }
            | EngineError::MetricsUnavailable(_) => true,
        }
    }
}

/// Helper for mapping any unknown error into a source failure
pub fn source_unavailable<E: ToString>(resource: ClusterResource, err: E) -> EngineError {
    EngineError::SourceUnavailable {
        resource,
        reason: err.to_string(),
    }
}
