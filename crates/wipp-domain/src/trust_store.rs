use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One PEM-encoded certificate, kept as the caller wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Certificate {
    pub pem_certificate: String,
}

impl Certificate {
    pub fn new(pem: impl Into<String>) -> Self {
        Self { pem_certificate: pem.into() }
    }

    /// Short content fingerprint used in diffs and reports instead of the
    /// PEM body.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.pem_certificate.as_bytes());
        let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        format!("sha256:{}", hex)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStore {
    pub trust_anchors: Vec<Certificate>,
    #[serde(default)]
    pub intermediate_cas: Vec<Certificate>,
}

impl TrustStore {
    pub fn new(trust_anchors: Vec<Certificate>, intermediate_cas: Vec<Certificate>) -> Self {
        Self { trust_anchors, intermediate_cas }
    }

    /// Drop byte-identical duplicates within each list, keeping the first
    /// occurrence. The two lists are handled independently: a certificate may
    /// legitimately be both an anchor and an intermediate.
    pub fn normalize(self) -> TrustStore {
        TrustStore {
            trust_anchors: dedup_in_order(self.trust_anchors),
            intermediate_cas: dedup_in_order(self.intermediate_cas),
        }
    }
}

fn dedup_in_order(certs: Vec<Certificate>) -> Vec<Certificate> {
    let mut seen = HashSet::new();
    certs
        .into_iter()
        .filter(|c| seen.insert(c.pem_certificate.clone()))
        .collect()
}

/// Render a certificate list as fingerprints, e.g. `[sha256:.., sha256:..]`.
pub fn render_certificates(certs: &[Certificate]) -> String {
    let parts: Vec<String> = certs.iter().map(Certificate::fingerprint).collect();
    format!("[{}]", parts.join(", "))
}
