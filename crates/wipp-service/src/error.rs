use thiserror::Error;
use wipp_domain::ProviderKey;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("provider not found: {0}")]
    NotFound(ProviderKey),

    #[error("provider already exists: {0}")]
    AlreadyExists(ProviderKey),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("internal service error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}
