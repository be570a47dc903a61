use std::path::{Path, PathBuf};

use tracing::debug;
use wipp_domain::{
    AwsSource, Certificate, CredentialSource, OidcSource, PoolId, ProviderConfiguration,
    ProviderId, TrustStore, X509Source,
};

use crate::error::ConfigError;
use crate::raw::{RawCertificate, RawProvider, RawTrustStore};

/// Load every provider found at `path`.
///
/// `path` may be a single YAML file or a directory. Directories are walked
/// recursively; every `*.yml` / `*.yaml` file is one provider:
/// ```text
/// <dir>/
///   aws-prod.yml
///   azure/
///     tenant-a.yaml
///     certs/anchor.pem    <- referenced via `pem_file: certs/anchor.pem`
/// ```
/// Files are returned in path order.
pub fn load_providers(path: &Path) -> Result<Vec<ProviderConfiguration>, ConfigError> {
    if path.is_file() {
        return Ok(vec![load_provider_file(path)?]);
    }

    let mut files = Vec::new();
    collect_yaml_files(path, &mut files)?;
    files.sort();

    files.iter().map(|f| load_provider_file(f)).collect()
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Load one provider file. `pem_file` references resolve against the
/// file's directory.
pub fn load_provider_file(path: &Path) -> Result<ProviderConfiguration, ConfigError> {
    debug!("Loading provider from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_provider(&content, base_dir, &path.display().to_string())
}

/// Parse provider YAML. `origin` names the source in error messages.
pub fn parse_provider(
    content: &str,
    base_dir: &Path,
    origin: &str,
) -> Result<ProviderConfiguration, ConfigError> {
    let raw: RawProvider = serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParse {
        path: origin.to_string(),
        source: e,
    })?;
    convert_provider(raw, base_dir, origin)
}

fn convert_provider(
    raw: RawProvider,
    base_dir: &Path,
    origin: &str,
) -> Result<ProviderConfiguration, ConfigError> {
    let aws = raw.aws.map(|a| AwsSource { account_id: a.account_id });
    let oidc = raw.oidc.map(|o| OidcSource {
        issuer_uri: o.issuer_uri,
        allowed_audiences: o.allowed_audiences,
        jwks_json: o.jwks_json,
    });
    let x509 = raw
        .x509
        .map(|x| convert_trust_store(x.trust_store, base_dir))
        .transpose()?
        .map(|trust_store| X509Source { trust_store });

    let credential_source =
        CredentialSource::from_parts(aws, oidc, x509).map_err(|e| ConfigError::Domain {
            path: origin.to_string(),
            source: e,
        })?;

    Ok(ProviderConfiguration {
        pool_id: PoolId::new(raw.pool_id),
        provider_id: ProviderId::new(raw.provider_id),
        display_name: raw.display_name,
        description: raw.description,
        disabled: raw.disabled,
        attribute_mapping: raw.attribute_mapping,
        attribute_condition: raw.attribute_condition,
        credential_source,
    })
}

fn convert_trust_store(raw: RawTrustStore, base_dir: &Path) -> Result<TrustStore, ConfigError> {
    let anchors = raw
        .trust_anchors
        .into_iter()
        .map(|c| convert_certificate(c, base_dir))
        .collect::<Result<Vec<_>, _>>()?;
    let intermediates = raw
        .intermediate_cas
        .into_iter()
        .map(|c| convert_certificate(c, base_dir))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TrustStore::new(anchors, intermediates))
}

fn convert_certificate(raw: RawCertificate, base_dir: &Path) -> Result<Certificate, ConfigError> {
    match raw {
        RawCertificate::Inline { pem_certificate } => Ok(Certificate::new(pem_certificate)),
        RawCertificate::File { pem_file } => {
            let path = base_dir.join(&pem_file);
            let pem = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            if pem.trim().is_empty() {
                return Err(ConfigError::Conversion {
                    path: path.display().to_string(),
                    message: "certificate file is empty".to_string(),
                });
            }
            Ok(Certificate::new(pem))
        }
    }
}
