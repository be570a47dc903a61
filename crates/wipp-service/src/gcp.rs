use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use wipp_domain::{
    AwsSource, Certificate, ChangeKind, ChangeSet, CredentialSource, ObservedProvider,
    OidcSource, PoolId, ProviderConfiguration, ProviderId, ProviderKey, ProviderState,
    TrustStore, X509Source,
};

use crate::error::ServiceError;
use crate::service::IdentityService;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Operator-level settings for the IAM backend.
#[derive(Debug, Clone)]
pub struct GcpIamServiceConfig {
    /// Project that owns the workload identity pools.
    pub project: String,
}

const IAM_BASE_URL: &str = "https://iam.googleapis.com";

// ── Token provider ────────────────────────────────────────────────────────────

#[async_trait]
trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ServiceError>;
}

/// Application Default Credentials.
struct AdcTokenProvider {
    inner: std::sync::Arc<dyn gcp_auth::TokenProvider>,
}

#[async_trait]
impl TokenProvider for AdcTokenProvider {
    async fn token(&self) -> Result<String, ServiceError> {
        let token = self
            .inner
            .token(&["https://www.googleapis.com/auth/cloud-platform"])
            .await
            .map_err(|e| ServiceError::Internal(format!("GCP auth failed: {}", e)))?;
        Ok(token.as_str().to_string())
    }
}

/// Fixed bearer token, no network call.
struct StaticToken(String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

// ── GcpIamService ─────────────────────────────────────────────────────────────

/// Workload identity pool providers through the IAM v1 REST API.
pub struct GcpIamService {
    config: GcpIamServiceConfig,
    client: reqwest::Client,
    token:  Box<dyn TokenProvider>,
    base:   String,
}

impl GcpIamService {
    /// Authenticate with Application Default Credentials
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, the metadata server, or
    /// `gcloud auth application-default login`).
    pub async fn from_adc(config: GcpIamServiceConfig) -> Result<Self, ServiceError> {
        let inner = gcp_auth::provider()
            .await
            .map_err(|e| ServiceError::Internal(format!("Failed to initialise GCP ADC: {}", e)))?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
            token:  Box::new(AdcTokenProvider { inner }),
            base:   IAM_BASE_URL.into(),
        })
    }

    /// Use a fixed bearer token against `base_url` (a proxy or a mock server).
    pub fn with_static_token(config: GcpIamServiceConfig, token: &str, base_url: &str) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token:  Box::new(StaticToken(token.to_string())),
            base:   base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn bearer(&self) -> Result<String, ServiceError> {
        self.token.token().await
    }

    fn parent(&self, pool_id: &PoolId) -> String {
        format!(
            "projects/{}/locations/global/workloadIdentityPools/{}",
            self.config.project, pool_id
        )
    }

    fn resource_name(&self, key: &ProviderKey) -> String {
        format!("{}/providers/{}", self.parent(&key.pool_id), key.provider_id)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.base, resource)
    }

    // ── GCP error parsing ─────────────────────────────────────────────────────

    /// `"INVALID_ARGUMENT: bad mapping [BAD_REQUEST: attributeMapping]"`
    fn extract_gcp_error(body: &Value) -> String {
        let err = &body["error"];
        let status  = err["status"].as_str().unwrap_or("UNKNOWN");
        let message = err["message"].as_str().unwrap_or("unknown error");

        let detail_suffix = err["details"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|d| {
                let reason = d["reason"].as_str()?;
                let meta_vals: Vec<&str> = d["metadata"]
                    .as_object()
                    .map(|m| m.values().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();
                Some(format!(" [{}: {}]", reason, meta_vals.join(", ")))
            })
            .unwrap_or_default();

        format!("{}: {}{}", status, message, detail_suffix)
    }

    /// Send a request and decode the JSON body, mapping 404 and 409 to the
    /// keyed errors.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        key: &ProviderKey,
    ) -> Result<Value, ServiceError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ServiceError::RequestFailed(e.to_string()))?;
        let status = resp.status();
        let body: Value = if status.as_u16() == 204 {
            Value::Null
        } else if status.is_success() {
            resp.json()
                .await
                .map_err(|e| ServiceError::Internal(format!("decode {} response: {}", key, e)))?
        } else {
            // Error bodies are best effort; the status alone is mapped.
            resp.json().await.unwrap_or(Value::Null)
        };

        match status.as_u16() {
            404 => Err(ServiceError::NotFound(key.clone())),
            409 => Err(ServiceError::AlreadyExists(key.clone())),
            _ if !status.is_success() => {
                Err(ServiceError::RequestFailed(Self::extract_gcp_error(&body)))
            }
            _ if body.get("error").is_some() => {
                Err(ServiceError::RequestFailed(Self::extract_gcp_error(&body)))
            }
            _ => Ok(body),
        }
    }

    // ── Long-running operation polling ────────────────────────────────────────

    /// Wait for the operation returned by a mutating call. Operations that
    /// come back already done are not polled.
    ///
    /// Backoff: 1 s, 2 s, 4 s, 8 s, 16 s, 30 s, 30 s, … (max 30 polls).
    async fn wait_for_operation(&self, op: &Value) -> Result<Value, ServiceError> {
        if op["done"].as_bool().unwrap_or(false) {
            return Self::operation_result(op);
        }
        let op_name = op["name"]
            .as_str()
            .ok_or_else(|| ServiceError::Internal("operation without a name".into()))?;
        let op_url = self.url(op_name);
        let token = self.bearer().await?;
        let delays = [1u64, 2, 4, 8, 16, 30];

        for &delay in delays.iter().cycle().take(30) {
            let resp: Value = self
                .client
                .get(&op_url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ServiceError::RequestFailed(format!("poll {}: {}", op_url, e)))?
                .json()
                .await
                .map_err(|e| ServiceError::Internal(format!("poll decode: {}", e)))?;

            if resp["done"].as_bool().unwrap_or(false) {
                return Self::operation_result(&resp);
            }

            debug!(operation = op_name, delay, "operation still running");
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        Err(ServiceError::RequestFailed(format!(
            "operation {} timed out after 30 polls",
            op_name
        )))
    }

    fn operation_result(op: &Value) -> Result<Value, ServiceError> {
        if op.get("error").is_some() {
            let msg = Self::extract_gcp_error(&json!({ "error": op["error"] }));
            return Err(ServiceError::RequestFailed(format!("operation failed: {}", msg)));
        }
        Ok(op["response"].clone())
    }
}

// ── REST representation ───────────────────────────────────────────────────────

fn certificates_to_rest(certs: &[Certificate]) -> Value {
    Value::Array(
        certs
            .iter()
            .map(|c| json!({ "pemCertificate": c.pem_certificate }))
            .collect(),
    )
}

/// Request body for create and patch. The identifiers travel in the URL.
fn to_rest(config: &ProviderConfiguration) -> Value {
    let mut body = Map::new();
    if let Some(name) = &config.display_name {
        body.insert("displayName".into(), json!(name));
    }
    if let Some(description) = &config.description {
        body.insert("description".into(), json!(description));
    }
    body.insert("disabled".into(), json!(config.disabled));
    body.insert("attributeMapping".into(), json!(config.attribute_mapping));
    if let Some(condition) = &config.attribute_condition {
        body.insert("attributeCondition".into(), json!(condition));
    }

    match &config.credential_source {
        CredentialSource::Aws(aws) => {
            body.insert("aws".into(), json!({ "accountId": aws.account_id }));
        }
        CredentialSource::Oidc(oidc) => {
            let mut block = json!({
                "issuerUri":        oidc.issuer_uri,
                "allowedAudiences": oidc.allowed_audiences,
            });
            if let Some(jwks) = &oidc.jwks_json {
                block["jwksJson"] = json!(jwks);
            }
            body.insert("oidc".into(), block);
        }
        CredentialSource::X509(x509) => {
            body.insert(
                "x509".into(),
                json!({
                    "trustStore": {
                        "trustAnchors":    certificates_to_rest(&x509.trust_store.trust_anchors),
                        "intermediateCas": certificates_to_rest(&x509.trust_store.intermediate_cas),
                    }
                }),
            );
        }
    }
    Value::Object(body)
}

fn certificates_from_rest(value: &Value) -> Vec<Certificate> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c["pemCertificate"].as_str())
                .map(Certificate::new)
                .collect()
        })
        .unwrap_or_default()
}

fn opt_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn from_rest(key: &ProviderKey, body: &Value) -> Result<ObservedProvider, ServiceError> {
    let aws = body
        .get("aws")
        .map(|a| AwsSource { account_id: a["accountId"].as_str().unwrap_or_default().into() });
    let oidc = body.get("oidc").map(|o| OidcSource {
        issuer_uri:        o["issuerUri"].as_str().unwrap_or_default().into(),
        allowed_audiences: o["allowedAudiences"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
            .unwrap_or_default(),
        jwks_json:         opt_str(&o["jwksJson"]),
    });
    let x509 = body.get("x509").map(|x| X509Source {
        trust_store: TrustStore::new(
            certificates_from_rest(&x["trustStore"]["trustAnchors"]),
            certificates_from_rest(&x["trustStore"]["intermediateCas"]),
        ),
    });
    let credential_source = CredentialSource::from_parts(aws, oidc, x509)
        .map_err(|e| ServiceError::Internal(format!("provider {}: {}", key, e)))?;

    let attribute_mapping: BTreeMap<String, String> = body["attributeMapping"]
        .as_object()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let state = match body["state"].as_str() {
        Some("DELETED") => ProviderState::Deleted,
        _ => ProviderState::Active,
    };

    Ok(ObservedProvider {
        name: body["name"].as_str().unwrap_or_default().to_string(),
        state,
        config: ProviderConfiguration {
            pool_id:             PoolId::new(key.pool_id.as_str()),
            provider_id:         ProviderId::new(key.provider_id.as_str()),
            display_name:        opt_str(&body["displayName"]),
            description:         opt_str(&body["description"]),
            disabled:            body["disabled"].as_bool().unwrap_or(false),
            attribute_mapping,
            attribute_condition: opt_str(&body["attributeCondition"]),
            credential_source,
        },
    })
}

// ── IdentityService impl ──────────────────────────────────────────────────────

#[async_trait]
impl IdentityService for GcpIamService {
    fn name(&self) -> &'static str {
        "gcp"
    }

    async fn create(
        &self,
        config: &ProviderConfiguration,
    ) -> Result<ObservedProvider, ServiceError> {
        let key = config.key();
        let token = self.bearer().await?;
        let url = format!("{}/providers", self.url(&self.parent(&key.pool_id)));

        info!(provider = %key, "Creating workload identity pool provider");
        let op = self
            .send(
                self.client
                    .post(&url)
                    .query(&[("workloadIdentityPoolProviderId", key.provider_id.as_str())])
                    .bearer_auth(&token)
                    .json(&to_rest(config)),
                &key,
            )
            .await?;
        self.wait_for_operation(&op).await?;
        self.read(&key).await
    }

    async fn update(
        &self,
        key: &ProviderKey,
        changes: &ChangeSet,
    ) -> Result<ObservedProvider, ServiceError> {
        if let Some(c) = changes
            .changes
            .iter()
            .find(|c| c.kind == ChangeKind::RequiresReplace)
        {
            return Err(ServiceError::RequestFailed(format!(
                "{} cannot be updated in place",
                c.field
            )));
        }
        let mask = changes.update_mask();
        if mask.is_empty() {
            return self.read(key).await;
        }

        let token = self.bearer().await?;
        let url = self.url(&self.resource_name(key));
        let update_mask = mask.join(",");
        info!(provider = %key, update_mask = %update_mask, "Patching workload identity pool provider");
        let op = self
            .send(
                self.client
                    .patch(&url)
                    .query(&[("updateMask", update_mask.as_str())])
                    .bearer_auth(&token)
                    .json(&to_rest(&changes.desired)),
                key,
            )
            .await?;
        self.wait_for_operation(&op).await?;
        self.read(key).await
    }

    async fn delete(&self, key: &ProviderKey) -> Result<(), ServiceError> {
        let token = self.bearer().await?;
        let url = self.url(&self.resource_name(key));

        info!(provider = %key, "Deleting workload identity pool provider");
        let op = self
            .send(self.client.delete(&url).bearer_auth(&token), key)
            .await?;
        self.wait_for_operation(&op).await?;
        Ok(())
    }

    async fn read(&self, key: &ProviderKey) -> Result<ObservedProvider, ServiceError> {
        let token = self.bearer().await?;
        let url = self.url(&self.resource_name(key));

        debug!(provider = %key, "Reading workload identity pool provider");
        let body = self.send(self.client.get(&url).bearer_auth(&token), key).await?;
        let observed = from_rest(key, &body)?;

        // Deleted providers linger for 30 days; they are gone for our purposes.
        if observed.state == ProviderState::Deleted {
            return Err(ServiceError::NotFound(key.clone()));
        }
        Ok(observed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wipp_domain::{Field, FieldChange};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROVIDER_PATH: &str =
        "/v1/projects/test-proj/locations/global/workloadIdentityPools/my-pool/providers/my-oidc";

    fn service(server: &MockServer) -> GcpIamService {
        GcpIamService::with_static_token(
            GcpIamServiceConfig { project: "test-proj".into() },
            "test-token",
            &server.uri(),
        )
    }

    fn key() -> ProviderKey {
        ProviderKey::new("my-pool", "my-oidc")
    }

    fn oidc_config() -> ProviderConfiguration {
        let mut cfg = ProviderConfiguration::new(
            "my-pool",
            "my-oidc",
            CredentialSource::Oidc(OidcSource {
                issuer_uri:        "https://sts.windows.net/tenant".into(),
                allowed_audiences: vec!["api://a".into(), "api://b".into()],
                jwks_json:         None,
            }),
        );
        cfg.display_name = Some("Azure".into());
        cfg.attribute_mapping
            .insert("google.subject".into(), "assertion.sub".into());
        cfg
    }

    fn provider_body() -> Value {
        json!({
            "name": "projects/123/locations/global/workloadIdentityPools/my-pool/providers/my-oidc",
            "displayName": "Azure",
            "state": "ACTIVE",
            "attributeMapping": { "google.subject": "assertion.sub" },
            "oidc": {
                "issuerUri":        "https://sts.windows.net/tenant",
                "allowedAudiences": ["api://a", "api://b"],
                "jwksJson":         "{\"keys\":[]}",
            },
        })
    }

    // ── REST conversion (pure) ────────────────────────────────────────────────

    #[test]
    fn rest_body_uses_camel_case_and_omits_unset_fields() {
        let body = to_rest(&oidc_config());
        assert_eq!(body["displayName"], "Azure");
        assert!(body.get("description").is_none());
        assert!(body.get("attributeCondition").is_none());
        assert_eq!(body["oidc"]["allowedAudiences"][1], "api://b");
        assert!(body["oidc"].get("jwksJson").is_none());
    }

    #[test]
    fn x509_round_trips_through_rest() {
        let mut cfg = ProviderConfiguration::new(
            "my-pool",
            "my-oidc",
            CredentialSource::X509(X509Source {
                trust_store: TrustStore::new(
                    vec![Certificate::new("A"), Certificate::new("B")],
                    vec![Certificate::new("I")],
                ),
            }),
        );
        cfg.disabled = true;
        let observed = from_rest(&key(), &to_rest(&cfg)).unwrap();
        assert_eq!(observed.config, cfg);
    }

    #[test]
    fn rest_without_source_is_internal_error() {
        let err = from_rest(&key(), &json!({ "state": "ACTIVE" })).unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn parse_gcp_error_with_error_info_details() {
        let body = json!({
            "error": {
                "code":    400,
                "status":  "INVALID_ARGUMENT",
                "message": "Invalid attribute mapping",
                "details": [{
                    "reason":   "BAD_REQUEST",
                    "metadata": { "field": "attributeMapping" },
                }],
            }
        });
        let msg = GcpIamService::extract_gcp_error(&body);
        assert!(msg.starts_with("INVALID_ARGUMENT: Invalid attribute mapping"));
        assert!(msg.contains("BAD_REQUEST"));
        assert!(msg.contains("attributeMapping"));
    }

    // ── read ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn read_active_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_body()))
            .mount(&server)
            .await;

        let observed = service(&server).read(&key()).await.unwrap();
        assert_eq!(observed.state, ProviderState::Active);
        assert_eq!(observed.config.display_name.as_deref(), Some("Azure"));
        match observed.config.credential_source {
            CredentialSource::Oidc(o) => {
                assert_eq!(o.allowed_audiences, vec!["api://a", "api://b"]);
                assert_eq!(o.jwks_json.as_deref(), Some("{\"keys\":[]}"));
            }
            other => panic!("expected oidc, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_soft_deleted_is_not_found() {
        let server = MockServer::start().await;
        let mut body = provider_body();
        body["state"] = json!("DELETED");
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = service(&server).read(&key()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn read_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "status": "NOT_FOUND", "message": "not found" },
            })))
            .mount(&server)
            .await;

        let err = service(&server).read(&key()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(k) if k == key()));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = service(&server).read(&key()).await.unwrap_err();
        match err {
            ServiceError::Internal(msg) => {
                assert!(msg.starts_with("decode my-pool/my-oidc response"), "{}", msg)
            }
            other => panic!("expected Internal, got {:?}", other),
        }
    }

    // ── create ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_polls_operation_then_reads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/test-proj/locations/global/workloadIdentityPools/my-pool/providers",
            ))
            .and(query_param("workloadIdentityPoolProviderId", "my-oidc"))
            .and(body_partial_json(json!({ "displayName": "Azure" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-proj/locations/global/workloadIdentityPools/my-pool/providers/my-oidc/operations/op-1",
                "done": false,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/operations/op-1", PROVIDER_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done":     true,
                "response": {},
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_body()))
            .mount(&server)
            .await;

        let observed = service(&server).create(&oidc_config()).await.unwrap();
        assert_eq!(observed.key(), key());
    }

    #[tokio::test]
    async fn create_409_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": { "code": 409, "status": "ALREADY_EXISTS", "message": "exists" },
            })))
            .mount(&server)
            .await;

        let err = service(&server).create(&oidc_config()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn failed_operation_surfaces_gcp_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name":  "operations/op-fail",
                "done":  true,
                "error": { "code": 403, "status": "PERMISSION_DENIED", "message": "denied" },
            })))
            .mount(&server)
            .await;

        let err = service(&server).create(&oidc_config()).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed(_)));
        assert!(err.to_string().contains("PERMISSION_DENIED"));
    }

    // ── update ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_sends_update_mask() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(PROVIDER_PATH))
            .and(query_param("updateMask", "displayName,oidc.allowedAudiences"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op-2",
                "done": true,
                "response": {},
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_body()))
            .mount(&server)
            .await;

        let changes = ChangeSet {
            key:     key(),
            desired: oidc_config(),
            changes: vec![
                FieldChange::new(Field::DisplayName, None, Some("Azure".into())),
                FieldChange::new(Field::OidcAllowedAudiences, None, Some("api://a, api://b".into())),
            ],
        };
        service(&server).update(&key(), &changes).await.unwrap();
    }

    #[tokio::test]
    async fn update_refuses_replacement_without_calling_backend() {
        let server = MockServer::start().await;
        let changes = ChangeSet {
            key:     key(),
            desired: oidc_config(),
            changes: vec![FieldChange::new(
                Field::CredentialSource,
                Some("aws".into()),
                Some("oidc".into()),
            )],
        };
        let err = service(&server).update(&key(), &changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    // ── delete ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_waits_for_operation() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PROVIDER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op-3",
                "done": true,
                "response": {},
            })))
            .expect(1)
            .mount(&server)
            .await;

        service(&server).delete(&key()).await.unwrap();
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = service(&server).delete(&key()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
