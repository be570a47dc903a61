use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Raw YAML representation of one provider file.
///
/// The credential source is written as three optional blocks, as in the
/// backend's REST shape; conversion enforces that exactly one is present.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawProvider {
    pub pool_id: String,
    pub provider_id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub attribute_mapping: BTreeMap<String, String>,
    pub attribute_condition: Option<String>,
    pub aws: Option<RawAws>,
    pub oidc: Option<RawOidc>,
    pub x509: Option<RawX509>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawAws {
    /// Accepts `"999999999999"` as well as a bare YAML number.
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawOidc {
    pub issuer_uri: String,
    #[serde(default)]
    pub allowed_audiences: Vec<String>,
    pub jwks_json: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawX509 {
    pub trust_store: RawTrustStore,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawTrustStore {
    #[serde(default)]
    pub trust_anchors: Vec<RawCertificate>,
    #[serde(default)]
    pub intermediate_cas: Vec<RawCertificate>,
}

/// A certificate given inline or as a path relative to the YAML file.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawCertificate {
    Inline { pem_certificate: String },
    File { pem_file: String },
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Num(u64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Num(n) => n.to_string(),
    })
}
