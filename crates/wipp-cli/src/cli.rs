use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use wipp_domain::Field;

#[derive(Debug, Parser)]
#[command(
    name = "wipp",
    about = "Declarative workload identity pool providers: validate, plan, apply and verify",
    version
)]
pub struct Cli {
    /// Backend holding provider state.
    #[arg(long, env = "WIPP_BACKEND", default_value = "memory", global = true)]
    pub backend: BackendArg,

    /// GCP project owning the pools (required for --backend gcp).
    #[arg(long, env = "WIPP_GCP_PROJECT", global = true)]
    pub gcp_project: Option<String>,

    /// Log output format. Verbosity comes from RUST_LOG.
    #[arg(long, env = "WIPP_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            backend: self.backend.clone(),
            gcp_project: self.gcp_project.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub backend: BackendArg,
    pub gcp_project: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check provider files locally without contacting any backend.
    Validate {
        /// A provider YAML file or a directory of them.
        path: PathBuf,
    },

    /// Show what would change without applying.
    Plan {
        /// A provider YAML file or a directory of them.
        path: PathBuf,

        #[arg(long, default_value = "text")]
        output: OutputFormat,
    },

    /// Create, update or replace providers to match their files.
    Apply {
        /// A provider YAML file or a directory of them.
        path: PathBuf,

        #[arg(long, default_value = "text")]
        output: OutputFormat,
    },

    /// Print a provider as the backend reports it.
    Show {
        pool_id: String,
        provider_id: String,
    },

    /// Delete a provider.
    Destroy {
        pool_id: String,
        provider_id: String,

        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Apply each file in turn, reading the provider back and comparing it
    /// after every step, then destroy it.
    Verify {
        /// Provider files for the same provider, in step order.
        #[arg(required = true)]
        steps: Vec<PathBuf>,

        /// Field to leave out of the comparison (repeatable), e.g.
        /// `display_name` or `attribute_mapping["google.subject"]`.
        #[arg(long, value_parser = parse_field)]
        ignore: Vec<Field>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum BackendArg {
    /// In-process state, discarded on exit.
    Memory,
    /// IAM REST API with Application Default Credentials.
    Gcp,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Parse a field as it is printed in plans and mismatch reports.
pub fn parse_field(s: &str) -> Result<Field, String> {
    if let Some(rest) = s.strip_prefix("attribute_mapping[") {
        let key = rest
            .strip_suffix(']')
            .map(|k| k.trim_matches('"'))
            .filter(|k| !k.is_empty())
            .ok_or_else(|| format!("malformed mapping field '{}'", s))?;
        return Ok(Field::AttributeMapping(key.to_string()));
    }

    let field = match s {
        "pool_id" => Field::PoolId,
        "provider_id" => Field::ProviderId,
        "display_name" => Field::DisplayName,
        "description" => Field::Description,
        "disabled" => Field::Disabled,
        "attribute_condition" => Field::AttributeCondition,
        "credential_source" => Field::CredentialSource,
        "aws.account_id" => Field::AwsAccountId,
        "oidc.issuer_uri" => Field::OidcIssuerUri,
        "oidc.allowed_audiences" => Field::OidcAllowedAudiences,
        "oidc.jwks_json" => Field::OidcJwksJson,
        "x509.trust_store.trust_anchors" => Field::X509TrustAnchors,
        "x509.trust_store.intermediate_cas" => Field::X509IntermediateCas,
        other => return Err(format!("unknown field '{}'", other)),
    };
    Ok(field)
}
