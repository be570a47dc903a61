use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use wipp_domain::{
    ChangeKind, ChangeSet, CredentialSource, Field, ObservedProvider, ProviderConfiguration,
    ProviderKey, ProviderState,
};

use crate::error::ServiceError;
use crate::service::IdentityService;

const PROJECT: &str = "in-memory";

/// Per-operation call counters. Failed calls are counted too.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub create: usize,
    pub read:   usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create + self.read + self.update + self.delete
    }

    pub fn mutating(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Default)]
struct Inner {
    providers:     HashMap<ProviderKey, ObservedProvider>,
    calls:         CallCounts,
    fail_next:     Option<ServiceError>,
    resolved_jwks: Option<String>,
}

/// In-process fake of the identity backend.
///
/// Stores exactly what it is given (no default mapping is filled in), so an
/// empty `attribute_mapping` reads back empty. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryService {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a backend that fetches the issuer's keys: OIDC providers
    /// stored without `jwks_json` read back with `jwks`.
    pub fn with_resolved_jwks(jwks: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                resolved_jwks: Some(jwks.into()),
                ..Default::default()
            })),
        }
    }

    /// Make the next call, whatever it is, fail with `error` without touching
    /// state.
    pub async fn fail_next(&self, error: ServiceError) {
        self.inner.write().await.fail_next = Some(error);
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.read().await.calls
    }

    pub async fn total_calls(&self) -> usize {
        self.inner.read().await.calls.total()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.providers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn resource_name(key: &ProviderKey) -> String {
        format!(
            "projects/{}/locations/global/workloadIdentityPools/{}/providers/{}",
            PROJECT, key.pool_id, key.provider_id
        )
    }
}

fn fill_jwks(config: &mut ProviderConfiguration, resolved: Option<&String>) {
    if let (CredentialSource::Oidc(oidc), Some(jwks)) = (&mut config.credential_source, resolved) {
        if oidc.jwks_json.is_none() {
            oidc.jwks_json = Some(jwks.clone());
        }
    }
}

/// Copy the fields named by `changes` from `changes.desired` onto `current`.
fn patch(
    current: &mut ProviderConfiguration,
    changes: &ChangeSet,
    resolved_jwks: Option<&String>,
) -> Result<(), ServiceError> {
    let desired = &changes.desired;
    for change in &changes.changes {
        if change.kind == ChangeKind::RequiresReplace {
            return Err(ServiceError::RequestFailed(format!(
                "{} cannot be updated in place",
                change.field
            )));
        }
        match (&change.field, &mut current.credential_source, &desired.credential_source) {
            (Field::DisplayName, _, _) => current.display_name = desired.display_name.clone(),
            (Field::Description, _, _) => current.description = desired.description.clone(),
            (Field::Disabled, _, _) => current.disabled = desired.disabled,
            (Field::AttributeMapping(_), _, _) => {
                current.attribute_mapping = desired.attribute_mapping.clone()
            }
            (Field::AttributeCondition, _, _) => {
                current.attribute_condition = desired.attribute_condition.clone()
            }
            (Field::AwsAccountId, CredentialSource::Aws(cur), CredentialSource::Aws(want)) => {
                cur.account_id = want.account_id.clone()
            }
            (Field::OidcIssuerUri, CredentialSource::Oidc(cur), CredentialSource::Oidc(want)) => {
                cur.issuer_uri = want.issuer_uri.clone()
            }
            (
                Field::OidcAllowedAudiences,
                CredentialSource::Oidc(cur),
                CredentialSource::Oidc(want),
            ) => cur.allowed_audiences = want.allowed_audiences.clone(),
            (Field::OidcJwksJson, CredentialSource::Oidc(cur), CredentialSource::Oidc(want)) => {
                cur.jwks_json = want.jwks_json.clone()
            }
            (
                Field::X509TrustAnchors | Field::X509IntermediateCas,
                CredentialSource::X509(cur),
                CredentialSource::X509(want),
            ) => cur.trust_store = want.trust_store.clone(),
            (field, cur, _) => {
                return Err(ServiceError::RequestFailed(format!(
                    "{} does not apply to a {} provider",
                    field,
                    cur.kind()
                )))
            }
        }
    }
    fill_jwks(current, resolved_jwks);
    Ok(())
}

#[async_trait]
impl IdentityService for InMemoryService {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        config: &ProviderConfiguration,
    ) -> Result<ObservedProvider, ServiceError> {
        let mut inner = self.inner.write().await;
        inner.calls.create += 1;
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        let key = config.key();
        debug!(provider = %key, "InMemoryService: create");
        if inner.providers.contains_key(&key) {
            return Err(ServiceError::AlreadyExists(key));
        }

        let mut stored = config.clone();
        fill_jwks(&mut stored, inner.resolved_jwks.as_ref());
        let observed = ObservedProvider {
            name:   Self::resource_name(&key),
            state:  ProviderState::Active,
            config: stored,
        };
        inner.providers.insert(key, observed.clone());
        Ok(observed)
    }

    async fn update(
        &self,
        key: &ProviderKey,
        changes: &ChangeSet,
    ) -> Result<ObservedProvider, ServiceError> {
        let mut inner = self.inner.write().await;
        inner.calls.update += 1;
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        debug!(provider = %key, fields = changes.changes.len(), "InMemoryService: update");
        let resolved = inner.resolved_jwks.clone();
        let existing = inner
            .providers
            .get(key)
            .ok_or_else(|| ServiceError::NotFound(key.clone()))?;

        // Patch a copy so a rejected change leaves the stored provider as is.
        let mut config = existing.config.clone();
        patch(&mut config, changes, resolved.as_ref())?;

        let observed = ObservedProvider {
            name:   existing.name.clone(),
            state:  existing.state,
            config,
        };
        inner.providers.insert(key.clone(), observed.clone());
        Ok(observed)
    }

    async fn delete(&self, key: &ProviderKey) -> Result<(), ServiceError> {
        let mut inner = self.inner.write().await;
        inner.calls.delete += 1;
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        debug!(provider = %key, "InMemoryService: delete");
        inner
            .providers
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(key.clone()))
    }

    async fn read(&self, key: &ProviderKey) -> Result<ObservedProvider, ServiceError> {
        let mut inner = self.inner.write().await;
        inner.calls.read += 1;
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        inner
            .providers
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipp_domain::{AwsSource, FieldChange, OidcSource};

    fn aws_config() -> ProviderConfiguration {
        ProviderConfiguration::new(
            "my-pool",
            "my-provider",
            CredentialSource::Aws(AwsSource { account_id: "999999999999".into() }),
        )
    }

    fn oidc_config() -> ProviderConfiguration {
        ProviderConfiguration::new(
            "my-pool",
            "my-oidc",
            CredentialSource::Oidc(OidcSource {
                issuer_uri:        "https://sts.windows.net/tenant".into(),
                allowed_audiences: vec!["api://app".into()],
                jwks_json:         None,
            }),
        )
    }

    #[tokio::test]
    async fn create_then_read_returns_stored_config() {
        let svc = InMemoryService::new();
        let created = svc.create(&aws_config()).await.unwrap();
        assert_eq!(created.state, ProviderState::Active);
        assert_eq!(
            created.name,
            "projects/in-memory/locations/global/workloadIdentityPools/my-pool/providers/my-provider"
        );

        let read = svc.read(&aws_config().key()).await.unwrap();
        assert_eq!(read, created);
        assert!(read.config.attribute_mapping.is_empty());
    }

    #[tokio::test]
    async fn create_twice_is_already_exists() {
        let svc = InMemoryService::new();
        svc.create(&aws_config()).await.unwrap();
        let err = svc.create(&aws_config()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let svc = InMemoryService::new();
        let err = svc.read(&ProviderKey::new("p", "x")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_copies_only_listed_fields() {
        let svc = InMemoryService::new();
        svc.create(&aws_config()).await.unwrap();

        let mut desired = aws_config();
        desired.disabled = true;
        desired.display_name = Some("ignored".into());
        let changes = ChangeSet {
            key: desired.key(),
            desired,
            changes: vec![FieldChange::new(
                Field::Disabled,
                Some("false".into()),
                Some("true".into()),
            )],
        };

        let updated = svc.update(&aws_config().key(), &changes).await.unwrap();
        assert!(updated.config.disabled);
        assert_eq!(updated.config.display_name, None);
    }

    #[tokio::test]
    async fn update_rejects_replacement_fields() {
        let svc = InMemoryService::new();
        svc.create(&aws_config()).await.unwrap();
        let changes = ChangeSet {
            key: aws_config().key(),
            desired: oidc_config(),
            changes: vec![FieldChange::new(
                Field::CredentialSource,
                Some("aws".into()),
                Some("oidc".into()),
            )],
        };
        let err = svc.update(&aws_config().key(), &changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed(_)));
        assert_eq!(svc.read(&aws_config().key()).await.unwrap().config, aws_config());
    }

    #[tokio::test]
    async fn resolved_jwks_fills_omitted_document() {
        let svc = InMemoryService::with_resolved_jwks(r#"{"keys":[]}"#);
        let created = svc.create(&oidc_config()).await.unwrap();
        match created.config.credential_source {
            CredentialSource::Oidc(o) => assert_eq!(o.jwks_json.as_deref(), Some(r#"{"keys":[]}"#)),
            other => panic!("expected oidc, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fail_next_fails_once_and_counts() {
        let svc = InMemoryService::new();
        svc.fail_next(ServiceError::RequestFailed("boom".into())).await;

        assert!(svc.create(&aws_config()).await.is_err());
        assert!(svc.is_empty().await);
        svc.create(&aws_config()).await.unwrap();

        let calls = svc.calls().await;
        assert_eq!(calls.create, 2);
        assert_eq!(calls.mutating(), 2);
        assert_eq!(svc.total_calls().await, 2);
    }

    #[tokio::test]
    async fn delete_removes_provider() {
        let svc = InMemoryService::new();
        svc.create(&aws_config()).await.unwrap();
        svc.delete(&aws_config().key()).await.unwrap();
        assert!(svc.read(&aws_config().key()).await.unwrap_err().is_not_found());
        assert!(svc.delete(&aws_config().key()).await.unwrap_err().is_not_found());
    }
}
