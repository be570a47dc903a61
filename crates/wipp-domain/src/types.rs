use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DomainError;
use crate::trust_store::TrustStore;

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl PoolId {
    pub fn new(s: impl Into<String>) -> Self {
        PoolId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(s: impl Into<String>) -> Self {
        ProviderId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The pair that uniquely identifies a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderKey {
    pub pool_id: PoolId,
    pub provider_id: ProviderId,
}

impl ProviderKey {
    pub fn new(pool_id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            pool_id: PoolId::new(pool_id),
            provider_id: ProviderId::new(provider_id),
        }
    }
}

impl std::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pool_id, self.provider_id)
    }
}

// ── Credential sources ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsSource {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcSource {
    pub issuer_uri: String,
    /// Order is kept as written; reordering is reported as a change.
    #[serde(default)]
    pub allowed_audiences: Vec<String>,
    /// Raw JWKS document. When absent the backend fetches keys from the issuer
    /// and may report the resolved document back.
    #[serde(default)]
    pub jwks_json: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Source {
    pub trust_store: TrustStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Aws,
    Oidc,
    X509,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Aws => write!(f, "aws"),
            SourceKind::Oidc => write!(f, "oidc"),
            SourceKind::X509 => write!(f, "x509"),
        }
    }
}

/// Exactly one external credential source per provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    Aws(AwsSource),
    Oidc(OidcSource),
    X509(X509Source),
}

impl CredentialSource {
    /// Build a source from the "three optional blocks" shape used by config
    /// files and the REST API. Anything other than exactly one populated
    /// block is rejected.
    pub fn from_parts(
        aws: Option<AwsSource>,
        oidc: Option<OidcSource>,
        x509: Option<X509Source>,
    ) -> Result<Self, DomainError> {
        let mut populated = Vec::new();
        if aws.is_some() {
            populated.push(SourceKind::Aws);
        }
        if oidc.is_some() {
            populated.push(SourceKind::Oidc);
        }
        if x509.is_some() {
            populated.push(SourceKind::X509);
        }

        match (aws, oidc, x509) {
            (Some(a), None, None) => Ok(CredentialSource::Aws(a)),
            (None, Some(o), None) => Ok(CredentialSource::Oidc(o)),
            (None, None, Some(x)) => Ok(CredentialSource::X509(x)),
            _ => Err(DomainError::ConflictingVariant { populated }),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            CredentialSource::Aws(_) => SourceKind::Aws,
            CredentialSource::Oidc(_) => SourceKind::Oidc,
            CredentialSource::X509(_) => SourceKind::X509,
        }
    }

    /// The mapping the backend applies when the caller leaves
    /// `attribute_mapping` empty. OIDC has none.
    pub fn default_attribute_mapping(&self) -> Option<BTreeMap<String, String>> {
        let pairs: &[(&str, &str)] = match self {
            CredentialSource::Aws(_) => &[
                ("google.subject", "assertion.arn"),
                ("attribute.aws_role", AWS_ROLE_EXPRESSION),
            ],
            CredentialSource::X509(_) => &[("google.subject", "assertion.subject.dn.cn")],
            CredentialSource::Oidc(_) => return None,
        };
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

const AWS_ROLE_EXPRESSION: &str = "assertion.arn.contains('assumed-role') ? \
    assertion.arn.extract('{account_arn}assumed-role/') + 'assumed-role/' + \
    assertion.arn.extract('assumed-role/{role_name}/') : assertion.arn";

// ── Provider configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    pub pool_id: PoolId,
    pub provider_id: ProviderId,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Destination attribute → source expression.
    #[serde(default)]
    pub attribute_mapping: BTreeMap<String, String>,
    pub attribute_condition: Option<String>,
    pub credential_source: CredentialSource,
}

impl ProviderConfiguration {
    /// A configuration with only the identifiers and a credential source set.
    pub fn new(
        pool_id: impl Into<String>,
        provider_id: impl Into<String>,
        credential_source: CredentialSource,
    ) -> Self {
        Self {
            pool_id: PoolId::new(pool_id),
            provider_id: ProviderId::new(provider_id),
            display_name: None,
            description: None,
            disabled: false,
            attribute_mapping: BTreeMap::new(),
            attribute_condition: None,
            credential_source,
        }
    }

    pub fn key(&self) -> ProviderKey {
        ProviderKey {
            pool_id: self.pool_id.clone(),
            provider_id: self.provider_id.clone(),
        }
    }

    /// The mapping the backend will actually apply: the explicit one, or the
    /// variant default when the explicit mapping is empty.
    pub fn effective_attribute_mapping(&self) -> BTreeMap<String, String> {
        if self.attribute_mapping.is_empty() {
            self.credential_source
                .default_attribute_mapping()
                .unwrap_or_default()
        } else {
            self.attribute_mapping.clone()
        }
    }
}

// ── Observed state ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Active,
    Deleted,
}

/// A provider as reported by the backend: the configuration plus fields only
/// the server sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedProvider {
    /// Full resource name, e.g.
    /// `projects/p/locations/global/workloadIdentityPools/pool/providers/id`.
    pub name: String,
    pub state: ProviderState,
    pub config: ProviderConfiguration,
}

impl ObservedProvider {
    pub fn key(&self) -> ProviderKey {
        self.config.key()
    }
}
