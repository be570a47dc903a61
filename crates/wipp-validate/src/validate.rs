use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use wipp_domain::{AwsSource, CredentialSource, OidcSource, ProviderConfiguration, X509Source};

use crate::error::ValidationError;
use crate::expr::validate_expression;

const GOOGLE_ATTRIBUTES: &[&str] = &[
    "subject",
    "groups",
    "display_name",
    "profile_photo",
    "posix_username",
];

const MAX_CUSTOM_ATTRIBUTES: usize = 50;
const MAX_ATTRIBUTE_NAME_LEN: usize = 100;
const MAX_EXPRESSION_LEN: usize = 2048;
const MAX_MAPPING_BYTES: usize = 8192;
const MAX_DISPLAY_NAME_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 256;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// A configuration that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig(ProviderConfiguration);

impl ValidatedConfig {
    pub fn config(&self) -> &ProviderConfiguration {
        &self.0
    }

    pub fn into_inner(self) -> ProviderConfiguration {
        self.0
    }
}

/// Validate a provider configuration locally.
///
/// Checks:
/// 1. Pool and provider identifiers
/// 2. Display name / description lengths
/// 3. Attribute mapping names, limits, `google.subject` presence
/// 4. Every mapping expression and the attribute condition
/// 5. The credential-source variant's own fields
///
/// All problems are collected; more than one is reported as
/// [`ValidationError::Multiple`].
pub fn validate(config: &ProviderConfiguration) -> Result<ValidatedConfig, ValidationError> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if let Err(e) = check_identifier("pool_id", config.pool_id.as_str()) {
        errors.push(e);
    }
    if let Err(e) = check_identifier("provider_id", config.provider_id.as_str()) {
        errors.push(e);
    }

    check_text("display_name", config.display_name.as_deref(), MAX_DISPLAY_NAME_LEN, &mut errors);
    check_text("description", config.description.as_deref(), MAX_DESCRIPTION_LEN, &mut errors);

    check_attribute_mapping(config, &mut errors);

    if let Some(condition) = config.attribute_condition.as_deref() {
        // Empty means unset.
        if !condition.trim().is_empty() {
            if let Err(source) = validate_expression(condition) {
                errors.push(ValidationError::InvalidExpression {
                    field: "attribute_condition".to_string(),
                    expression: condition.to_string(),
                    source,
                });
            }
        }
    }

    match &config.credential_source {
        CredentialSource::Aws(aws) => check_aws(aws, &mut errors),
        CredentialSource::Oidc(oidc) => check_oidc(oidc, &mut errors),
        CredentialSource::X509(x509) => check_x509(x509, &mut errors),
    }

    if !errors.is_empty() {
        if errors.len() == 1 {
            return Err(errors.remove(0));
        }
        return Err(ValidationError::Multiple(errors));
    }

    Ok(ValidatedConfig(config.clone()))
}

/// Identifiers are 4-32 characters of `[a-z0-9-]` and may not use the
/// reserved `gcp-` prefix.
pub fn check_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if !(4..=32).contains(&value.len()) {
        return Err(invalid("must be 4 to 32 characters long"));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("may contain only lowercase letters, digits and hyphens"));
    }
    if value.starts_with("gcp-") {
        return Err(invalid("the 'gcp-' prefix is reserved"));
    }
    Ok(())
}

fn check_text(field: &str, value: Option<&str>, max: usize, errors: &mut Vec<ValidationError>) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.push(ValidationError::InvalidField {
                field: field.to_string(),
                reason: format!("must be at most {} characters", max),
            });
        }
    }
}

/// Destination attributes are `google.<known>` or `attribute.<[a-z0-9_]+>`.
pub fn check_attribute_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidAttributeName {
        name: name.to_string(),
        reason,
    };

    if let Some(suffix) = name.strip_prefix("google.") {
        if !GOOGLE_ATTRIBUTES.contains(&suffix) {
            return Err(invalid(format!(
                "unknown google attribute; expected one of {}",
                GOOGLE_ATTRIBUTES.join(", ")
            )));
        }
        return Ok(());
    }

    if let Some(suffix) = name.strip_prefix("attribute.") {
        if suffix.is_empty() {
            return Err(invalid("custom attribute name is empty".to_string()));
        }
        if name.len() > MAX_ATTRIBUTE_NAME_LEN {
            return Err(invalid(format!("must be at most {} characters", MAX_ATTRIBUTE_NAME_LEN)));
        }
        if !suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(invalid(
                "custom attribute names may contain only [a-z0-9_]".to_string(),
            ));
        }
        return Ok(());
    }

    Err(invalid("must start with 'google.' or 'attribute.'".to_string()))
}

fn check_attribute_mapping(config: &ProviderConfiguration, errors: &mut Vec<ValidationError>) {
    let mapping = &config.attribute_mapping;

    if mapping.is_empty() {
        if config.credential_source.default_attribute_mapping().is_none() {
            errors.push(ValidationError::MissingRequiredField {
                field: "attribute_mapping[\"google.subject\"]".to_string(),
            });
        }
        return;
    }

    if !mapping.contains_key("google.subject") {
        errors.push(ValidationError::MissingRequiredField {
            field: "attribute_mapping[\"google.subject\"]".to_string(),
        });
    }

    let custom = mapping.keys().filter(|k| k.starts_with("attribute.")).count();
    if custom > MAX_CUSTOM_ATTRIBUTES {
        errors.push(ValidationError::InvalidField {
            field: "attribute_mapping".to_string(),
            reason: format!(
                "{} custom attributes mapped, at most {} allowed",
                custom, MAX_CUSTOM_ATTRIBUTES
            ),
        });
    }

    let total: usize = mapping.iter().map(|(k, v)| k.len() + v.len()).sum();
    if total > MAX_MAPPING_BYTES {
        errors.push(ValidationError::InvalidField {
            field: "attribute_mapping".to_string(),
            reason: format!("{} bytes in total, at most {} allowed", total, MAX_MAPPING_BYTES),
        });
    }

    for (name, expression) in mapping {
        if let Err(e) = check_attribute_name(name) {
            errors.push(e);
        }

        let field = format!("attribute_mapping[\"{}\"]", name);
        if expression.len() > MAX_EXPRESSION_LEN {
            errors.push(ValidationError::InvalidField {
                field,
                reason: format!("expression longer than {} characters", MAX_EXPRESSION_LEN),
            });
            continue;
        }
        if let Err(source) = validate_expression(expression) {
            errors.push(ValidationError::InvalidExpression {
                field,
                expression: expression.clone(),
                source,
            });
        }
    }
}

fn check_aws(aws: &AwsSource, errors: &mut Vec<ValidationError>) {
    if aws.account_id.trim().is_empty() {
        errors.push(ValidationError::MissingRequiredField {
            field: "aws.account_id".to_string(),
        });
        return;
    }
    if aws.account_id.len() != 12 || !aws.account_id.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(ValidationError::InvalidField {
            field: "aws.account_id".to_string(),
            reason: format!("'{}' is not a 12-digit AWS account id", aws.account_id),
        });
    }
}

fn check_oidc(oidc: &OidcSource, errors: &mut Vec<ValidationError>) {
    if oidc.issuer_uri.trim().is_empty() {
        errors.push(ValidationError::MissingRequiredField {
            field: "oidc.issuer_uri".to_string(),
        });
    } else {
        match url::Url::parse(&oidc.issuer_uri) {
            Ok(url) if matches!(url.scheme(), "https" | "http") && url.has_host() => {}
            Ok(url) => errors.push(ValidationError::InvalidField {
                field: "oidc.issuer_uri".to_string(),
                reason: format!("unsupported issuer URI scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidField {
                field: "oidc.issuer_uri".to_string(),
                reason: format!("'{}' is not a valid URI: {}", oidc.issuer_uri, e),
            }),
        }
    }

    for (i, audience) in oidc.allowed_audiences.iter().enumerate() {
        if audience.trim().is_empty() {
            errors.push(ValidationError::InvalidField {
                field: format!("oidc.allowed_audiences[{}]", i),
                reason: "audience is empty".to_string(),
            });
        }
    }

    if let Some(jwks) = oidc.jwks_json.as_deref() {
        if let Err(reason) = check_jwks(jwks) {
            errors.push(ValidationError::InvalidField {
                field: "oidc.jwks_json".to_string(),
                reason,
            });
        }
    }
}

fn check_jwks(jwks: &str) -> Result<(), String> {
    let doc: serde_json::Value =
        serde_json::from_str(jwks).map_err(|e| format!("not valid JSON: {}", e))?;
    match doc.get("keys") {
        Some(serde_json::Value::Array(_)) => Ok(()),
        _ => Err("a JWKS document must be an object with a 'keys' array".to_string()),
    }
}

fn check_x509(x509: &X509Source, errors: &mut Vec<ValidationError>) {
    let store = &x509.trust_store;
    if store.trust_anchors.is_empty() {
        errors.push(ValidationError::MissingRequiredField {
            field: "x509.trust_store.trust_anchors".to_string(),
        });
    }
    for (i, cert) in store.trust_anchors.iter().enumerate() {
        if let Err(reason) = check_pem(&cert.pem_certificate) {
            errors.push(ValidationError::InvalidField {
                field: format!("x509.trust_store.trust_anchors[{}]", i),
                reason,
            });
        }
    }
    for (i, cert) in store.intermediate_cas.iter().enumerate() {
        if let Err(reason) = check_pem(&cert.pem_certificate) {
            errors.push(ValidationError::InvalidField {
                field: format!("x509.trust_store.intermediate_cas[{}]", i),
                reason,
            });
        }
    }
}

/// Structural PEM check only: one CERTIFICATE block with a base64 body.
/// Parsing the DER is left to the backend.
pub fn check_pem(pem: &str) -> Result<(), String> {
    let body = pem
        .trim()
        .strip_prefix(PEM_BEGIN)
        .and_then(|rest| rest.strip_suffix(PEM_END))
        .ok_or_else(|| "not a PEM certificate (missing BEGIN/END CERTIFICATE markers)".to_string())?;

    if body.contains("-----") {
        return Err("expected exactly one PEM block".to_string());
    }

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err("PEM block has an empty body".to_string());
    }
    STANDARD
        .decode(compact.as_bytes())
        .map(|_| ())
        .map_err(|e| format!("PEM body is not valid base64: {}", e))
}
