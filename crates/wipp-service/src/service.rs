use async_trait::async_trait;
use wipp_domain::{ChangeSet, ObservedProvider, ProviderConfiguration, ProviderKey};

use crate::error::ServiceError;

/// The backend that owns provider state.
///
/// Every call is treated as atomic: on error nothing was changed. Callers
/// serialize calls per [`ProviderKey`]; distinct keys may be driven
/// concurrently.
#[async_trait]
pub trait IdentityService: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    // ── Mutating ──────────────────────────────────────────────────────────────

    async fn create(
        &self,
        config: &ProviderConfiguration,
    ) -> Result<ObservedProvider, ServiceError>;

    /// Apply the in-place changes of `changes` to the provider at `key`.
    /// Values come from `changes.desired`; only the fields listed in
    /// `changes.changes` are sent.
    async fn update(
        &self,
        key: &ProviderKey,
        changes: &ChangeSet,
    ) -> Result<ObservedProvider, ServiceError>;

    async fn delete(&self, key: &ProviderKey) -> Result<(), ServiceError>;

    // ── Read-only ─────────────────────────────────────────────────────────────

    /// Read a provider by key alone. Soft-deleted providers are reported as
    /// [`ServiceError::NotFound`].
    async fn read(&self, key: &ProviderKey) -> Result<ObservedProvider, ServiceError>;
}
