use serde::{Deserialize, Serialize};

use crate::types::{ProviderConfiguration, ProviderKey};

/// A comparable field of a provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "key", rename_all = "snake_case")]
pub enum Field {
    PoolId,
    ProviderId,
    DisplayName,
    Description,
    Disabled,
    /// One entry of the attribute mapping, by destination attribute.
    AttributeMapping(String),
    AttributeCondition,
    /// Which variant is populated.
    CredentialSource,
    AwsAccountId,
    OidcIssuerUri,
    OidcAllowedAudiences,
    OidcJwksJson,
    X509TrustAnchors,
    X509IntermediateCas,
}

impl Field {
    /// Identifier changes and variant switches cannot be patched.
    pub fn change_kind(&self) -> ChangeKind {
        match self {
            Field::PoolId | Field::ProviderId | Field::CredentialSource => {
                ChangeKind::RequiresReplace
            }
            _ => ChangeKind::InPlace,
        }
    }

    /// Backend update-mask path. AWS and X.509 substructures are always sent
    /// whole.
    pub fn update_mask_path(&self) -> Option<&'static str> {
        match self {
            Field::PoolId | Field::ProviderId | Field::CredentialSource => None,
            Field::DisplayName => Some("displayName"),
            Field::Description => Some("description"),
            Field::Disabled => Some("disabled"),
            Field::AttributeMapping(_) => Some("attributeMapping"),
            Field::AttributeCondition => Some("attributeCondition"),
            Field::AwsAccountId => Some("aws"),
            Field::OidcIssuerUri => Some("oidc.issuerUri"),
            Field::OidcAllowedAudiences => Some("oidc.allowedAudiences"),
            Field::OidcJwksJson => Some("oidc.jwksJson"),
            Field::X509TrustAnchors | Field::X509IntermediateCas => Some("x509"),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::PoolId => write!(f, "pool_id"),
            Field::ProviderId => write!(f, "provider_id"),
            Field::DisplayName => write!(f, "display_name"),
            Field::Description => write!(f, "description"),
            Field::Disabled => write!(f, "disabled"),
            Field::AttributeMapping(key) => write!(f, "attribute_mapping[\"{}\"]", key),
            Field::AttributeCondition => write!(f, "attribute_condition"),
            Field::CredentialSource => write!(f, "credential_source"),
            Field::AwsAccountId => write!(f, "aws.account_id"),
            Field::OidcIssuerUri => write!(f, "oidc.issuer_uri"),
            Field::OidcAllowedAudiences => write!(f, "oidc.allowed_audiences"),
            Field::OidcJwksJson => write!(f, "oidc.jwks_json"),
            Field::X509TrustAnchors => write!(f, "x509.trust_store.trust_anchors"),
            Field::X509IntermediateCas => write!(f, "x509.trust_store.intermediate_cas"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    InPlace,
    RequiresReplace,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::InPlace => write!(f, "in-place"),
            ChangeKind::RequiresReplace => write!(f, "requires replace"),
        }
    }
}

/// One differing field. `before`/`after` are rendered values; `None` means
/// the field is unset on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: Field,
    pub kind: ChangeKind,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldChange {
    pub fn new(field: Field, before: Option<String>, after: Option<String>) -> Self {
        let kind = field.change_kind();
        Self { field, kind, before, after }
    }
}

/// The result of diffing a desired configuration against the observed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Key of the existing resource the changes apply to.
    pub key: ProviderKey,
    /// Normalized desired configuration the changes lead to.
    pub desired: ProviderConfiguration,
    pub changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.kind == ChangeKind::RequiresReplace)
    }

    pub fn fields(&self) -> Vec<&Field> {
        self.changes.iter().map(|c| &c.field).collect()
    }

    pub fn contains(&self, field: &Field) -> bool {
        self.changes.iter().any(|c| &c.field == field)
    }

    /// Distinct update-mask paths, in first-seen order.
    pub fn update_mask(&self) -> Vec<&'static str> {
        let mut mask = Vec::new();
        for change in &self.changes {
            if let Some(path) = change.field.update_mask_path() {
                if !mask.contains(&path) {
                    mask.push(path);
                }
            }
        }
        mask
    }
}
