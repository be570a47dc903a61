pub mod change;
pub mod error;
pub mod trust_store;
pub mod types;

#[cfg(test)]
mod tests;

pub use change::{ChangeKind, ChangeSet, Field, FieldChange};
pub use error::DomainError;
pub use trust_store::{render_certificates, Certificate, TrustStore};
pub use types::{
    AwsSource, CredentialSource, ObservedProvider, OidcSource, PoolId, ProviderConfiguration,
    ProviderId, ProviderKey, ProviderState, SourceKind, X509Source,
};
