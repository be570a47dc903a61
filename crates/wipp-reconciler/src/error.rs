use thiserror::Error;
use wipp_domain::ProviderKey;

use crate::report::{LifecycleState, Mismatch};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] wipp_validate::ValidationError),

    #[error("external service error: {0}")]
    ExternalService(#[from] wipp_service::ServiceError),

    #[error("provider not found: {0}")]
    NotFound(ProviderKey),

    #[error("verification of {key} failed: {}", render_mismatches(.mismatches))]
    VerificationMismatch {
        key: ProviderKey,
        mismatches: Vec<Mismatch>,
    },

    #[error("cannot {operation} a provider in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("provider {0} is declared more than once")]
    DuplicateKey(ProviderKey),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// Lift a service error, turning `NotFound` into the reconciler's own.
    pub(crate) fn from_service(err: wipp_service::ServiceError) -> Self {
        match err {
            wipp_service::ServiceError::NotFound(key) => ReconcileError::NotFound(key),
            other => ReconcileError::ExternalService(other),
        }
    }
}

fn render_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
