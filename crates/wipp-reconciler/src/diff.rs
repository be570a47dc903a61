use std::collections::BTreeSet;

use wipp_domain::{
    render_certificates, ChangeSet, CredentialSource, Field, FieldChange, ObservedProvider,
    ProviderConfiguration,
};

use crate::report::Mismatch;

/// Canonical form used for every comparison: empty optional text is unset
/// and trust-store lists carry no duplicates.
pub fn normalize(config: &ProviderConfiguration) -> ProviderConfiguration {
    let mut out = config.clone();
    out.display_name = non_empty(out.display_name);
    out.description = non_empty(out.description);
    out.attribute_condition = non_empty(out.attribute_condition);
    match &mut out.credential_source {
        CredentialSource::Oidc(oidc) => oidc.jwks_json = non_empty(oidc.jwks_json.take()),
        CredentialSource::X509(x509) => {
            x509.trust_store = std::mem::take(&mut x509.trust_store).normalize()
        }
        CredentialSource::Aws(_) => {}
    }
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Diff `desired` against what the backend reports.
///
/// The change set is keyed by the observed provider; `desired` is carried
/// normalized so it can be handed to the service as is. An OIDC `jwks_json`
/// left out of `desired` is treated as server-populated and not diffed.
pub fn diff(desired: &ProviderConfiguration, observed: &ObservedProvider) -> ChangeSet {
    diff_from(desired, observed, None)
}

/// Like [`diff`], with the configuration applied last. A `jwks_json` that
/// `previous` pinned and `desired` omits is cleared rather than left behind.
pub fn diff_from(
    desired: &ProviderConfiguration,
    observed: &ObservedProvider,
    previous: Option<&ProviderConfiguration>,
) -> ChangeSet {
    let desired = normalize(desired);
    let current = normalize(&observed.config);
    let pinned = previous.map(normalize).is_some_and(|p| pins_jwks(&p));
    let changes = field_changes(&desired, &current, pinned);
    ChangeSet {
        key: observed.key(),
        desired,
        changes,
    }
}

/// Field-by-field comparison of two observed states, excluding `ignore`.
/// A `jwks_json` that `expected` does not set is the backend's to fill in
/// and is not compared.
pub fn compare(
    expected: &ProviderConfiguration,
    observed: &ProviderConfiguration,
    ignore: &[Field],
) -> Vec<Mismatch> {
    let expected = normalize(expected);
    let observed = normalize(observed);

    field_changes(&expected, &observed, false)
        .into_iter()
        .filter(|c| !ignore.contains(&c.field))
        .map(|c| Mismatch {
            field: c.field,
            expected: c.after,
            observed: c.before,
        })
        .collect()
}

fn pins_jwks(config: &ProviderConfiguration) -> bool {
    matches!(&config.credential_source, CredentialSource::Oidc(o) if o.jwks_json.is_some())
}

/// `before` is taken from `current`, `after` from `desired`. Both must be
/// normalized. `jwks_json` is compared when `desired` sets it or when
/// `clear_jwks` asks for an unset one to be removed.
fn field_changes(
    desired: &ProviderConfiguration,
    current: &ProviderConfiguration,
    clear_jwks: bool,
) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |field: Field, before: Option<String>, after: Option<String>| {
        if before != after {
            changes.push(FieldChange::new(field, before, after));
        }
    };

    push(
        Field::PoolId,
        Some(current.pool_id.to_string()),
        Some(desired.pool_id.to_string()),
    );
    push(
        Field::ProviderId,
        Some(current.provider_id.to_string()),
        Some(desired.provider_id.to_string()),
    );
    push(Field::DisplayName, current.display_name.clone(), desired.display_name.clone());
    push(Field::Description, current.description.clone(), desired.description.clone());
    push(
        Field::Disabled,
        Some(current.disabled.to_string()),
        Some(desired.disabled.to_string()),
    );

    // Mapping entries are compared as the backend will apply them.
    let want = desired.effective_attribute_mapping();
    let have = current.effective_attribute_mapping();
    let keys: BTreeSet<&String> = want.keys().chain(have.keys()).collect();
    for key in keys {
        push(
            Field::AttributeMapping(key.clone()),
            have.get(key).cloned(),
            want.get(key).cloned(),
        );
    }

    push(
        Field::AttributeCondition,
        current.attribute_condition.clone(),
        desired.attribute_condition.clone(),
    );

    match (&current.credential_source, &desired.credential_source) {
        (CredentialSource::Aws(have), CredentialSource::Aws(want)) => {
            push(
                Field::AwsAccountId,
                Some(have.account_id.clone()),
                Some(want.account_id.clone()),
            );
        }
        (CredentialSource::Oidc(have), CredentialSource::Oidc(want)) => {
            push(
                Field::OidcIssuerUri,
                Some(have.issuer_uri.clone()),
                Some(want.issuer_uri.clone()),
            );
            push(
                Field::OidcAllowedAudiences,
                Some(render_list(&have.allowed_audiences)),
                Some(render_list(&want.allowed_audiences)),
            );
            if want.jwks_json.is_some() || clear_jwks {
                push(Field::OidcJwksJson, have.jwks_json.clone(), want.jwks_json.clone());
            }
        }
        (CredentialSource::X509(have), CredentialSource::X509(want)) => {
            push(
                Field::X509TrustAnchors,
                Some(render_certificates(&have.trust_store.trust_anchors)),
                Some(render_certificates(&want.trust_store.trust_anchors)),
            );
            push(
                Field::X509IntermediateCas,
                Some(render_certificates(&have.trust_store.intermediate_cas)),
                Some(render_certificates(&want.trust_store.intermediate_cas)),
            );
        }
        (have, want) => push(
            Field::CredentialSource,
            Some(have.kind().to_string()),
            Some(want.kind().to_string()),
        ),
    }

    changes
}

fn render_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipp_domain::{
        AwsSource, Certificate, ChangeKind, OidcSource, ProviderState, TrustStore, X509Source,
    };

    fn observed(config: ProviderConfiguration) -> ObservedProvider {
        ObservedProvider {
            name: format!("projects/p/locations/global/workloadIdentityPools/{}", config.key()),
            state: ProviderState::Active,
            config,
        }
    }

    fn aws() -> ProviderConfiguration {
        ProviderConfiguration::new(
            "my-pool",
            "my-provider",
            CredentialSource::Aws(AwsSource { account_id: "999999999999".into() }),
        )
    }

    fn oidc(audiences: &[&str], jwks: Option<&str>) -> ProviderConfiguration {
        ProviderConfiguration::new(
            "my-pool",
            "my-provider",
            CredentialSource::Oidc(OidcSource {
                issuer_uri: "https://sts.windows.net/tenant".into(),
                allowed_audiences: audiences.iter().map(|s| s.to_string()).collect(),
                jwks_json: jwks.map(str::to_string),
            }),
        )
    }

    fn x509(anchors: &[&str]) -> ProviderConfiguration {
        ProviderConfiguration::new(
            "my-pool",
            "my-provider",
            CredentialSource::X509(X509Source {
                trust_store: TrustStore::new(
                    anchors.iter().map(|a| Certificate::new(*a)).collect(),
                    vec![],
                ),
            }),
        )
    }

    #[test]
    fn identical_configs_have_no_changes() {
        let cs = diff(&aws(), &observed(aws()));
        assert!(cs.is_empty());
        assert_eq!(cs.key, aws().key());
    }

    #[test]
    fn empty_text_equals_unset() {
        let mut desired = aws();
        desired.description = Some(String::new());
        desired.attribute_condition = Some(String::new());
        let cs = diff(&desired, &observed(aws()));
        assert!(cs.is_empty());
        assert_eq!(cs.desired.description, None);
    }

    #[test]
    fn disabled_alone_is_in_place() {
        let mut desired = aws();
        desired.disabled = true;
        let cs = diff(&desired, &observed(aws()));
        assert_eq!(cs.fields(), vec![&Field::Disabled]);
        assert_eq!(cs.changes[0].kind, ChangeKind::InPlace);
        assert_eq!(cs.changes[0].before.as_deref(), Some("false"));
        assert_eq!(cs.changes[0].after.as_deref(), Some("true"));
        assert!(!cs.requires_replace());
    }

    #[test]
    fn provider_id_change_requires_replace() {
        let mut desired = aws();
        desired.provider_id = wipp_domain::ProviderId::new("other-provider");
        let cs = diff(&desired, &observed(aws()));
        assert!(cs.requires_replace());
        assert!(cs.contains(&Field::ProviderId));
        assert_eq!(cs.key, aws().key());
    }

    #[test]
    fn variant_switch_requires_replace() {
        let cs = diff(&oidc(&["a"], None), &observed(aws()));
        assert_eq!(cs.fields(), vec![&Field::CredentialSource]);
        assert!(cs.requires_replace());
    }

    #[test]
    fn empty_mapping_compares_as_variant_default() {
        let mut current = aws();
        current.attribute_mapping.insert("google.subject".into(), "assertion.arn".into());
        current.attribute_mapping.insert(
            "attribute.aws_role".into(),
            aws().effective_attribute_mapping()["attribute.aws_role"].clone(),
        );
        assert!(diff(&aws(), &observed(current)).is_empty());
    }

    #[test]
    fn removed_mapping_key_reverts_to_default() {
        let mut current = aws();
        current.attribute_mapping.insert("google.subject".into(), "assertion.arn".into());
        current.attribute_mapping.insert("attribute.team".into(), "assertion.team".into());

        let cs = diff(&aws(), &observed(current));
        let team = Field::AttributeMapping("attribute.team".into());
        let role = Field::AttributeMapping("attribute.aws_role".into());
        assert!(cs.contains(&team));
        assert!(cs.contains(&role));
        assert!(!cs.contains(&Field::AttributeMapping("google.subject".into())));
        let removed = cs.changes.iter().find(|c| c.field == team).unwrap();
        assert_eq!(removed.after, None);
        assert_eq!(cs.update_mask(), vec!["attributeMapping"]);
    }

    #[test]
    fn audience_reorder_is_a_change() {
        let cs = diff(&oidc(&["b", "a"], None), &observed(oidc(&["a", "b"], None)));
        assert_eq!(cs.fields(), vec![&Field::OidcAllowedAudiences]);
        assert_eq!(cs.changes[0].after.as_deref(), Some("[b, a]"));
    }

    #[test]
    fn omitted_jwks_is_not_diffed() {
        let cs = diff(&oidc(&["a"], None), &observed(oidc(&["a"], Some(r#"{"keys":[]}"#))));
        assert!(cs.is_empty());

        let cs = diff(
            &oidc(&["a"], Some(r#"{"keys":[{}]}"#)),
            &observed(oidc(&["a"], Some(r#"{"keys":[]}"#))),
        );
        assert_eq!(cs.update_mask(), vec!["oidc.jwksJson"]);
    }

    #[test]
    fn certificates_render_as_fingerprints() {
        let cs = diff(&x509(&["A", "B"]), &observed(x509(&["A"])));
        assert_eq!(cs.fields(), vec![&Field::X509TrustAnchors]);
        let after = cs.changes[0].after.clone().unwrap();
        assert!(after.starts_with("[sha256:"));
        assert!(!after.contains('B'));
        assert_eq!(cs.update_mask(), vec!["x509"]);
    }

    #[test]
    fn duplicate_certificates_collapse_before_diff() {
        let cs = diff(&x509(&["A", "A"]), &observed(x509(&["A"])));
        assert!(cs.is_empty());
    }

    #[test]
    fn jwks_pinned_before_is_cleared() {
        let pinned = oidc(&["a"], Some(r#"{"keys":[]}"#));
        let cs = diff_from(&oidc(&["a"], None), &observed(pinned.clone()), Some(&pinned));
        assert_eq!(cs.fields(), vec![&Field::OidcJwksJson]);
        assert_eq!(cs.changes[0].before.as_deref(), Some(r#"{"keys":[]}"#));
        assert_eq!(cs.changes[0].after, None);
        assert_eq!(cs.update_mask(), vec!["oidc.jwksJson"]);

        // Filled in by the backend, never pinned.
        let unpinned = oidc(&["a"], None);
        let cs = diff_from(&unpinned, &observed(pinned), Some(&unpinned));
        assert!(cs.is_empty());
    }

    #[test]
    fn compare_checks_jwks_only_when_expected_sets_it() {
        let served = oidc(&["a"], Some(r#"{"keys":[{"kid":"1"}]}"#));
        assert!(compare(&oidc(&["a"], None), &served, &[]).is_empty());

        let mismatches = compare(&oidc(&["a"], Some(r#"{"keys":[]}"#)), &served, &[]);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, Field::OidcJwksJson);
        assert_eq!(mismatches[0].expected.as_deref(), Some(r#"{"keys":[]}"#));
    }

    #[test]
    fn compare_skips_ignored_fields() {
        let expected = aws();
        let mut observed_cfg = aws();
        observed_cfg.display_name = Some("renamed".into());

        let mismatches = compare(&expected, &observed_cfg, &[]);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, Field::DisplayName);
        assert_eq!(mismatches[0].expected, None);
        assert_eq!(mismatches[0].observed.as_deref(), Some("renamed"));

        assert!(compare(&expected, &observed_cfg, &[Field::DisplayName]).is_empty());
    }
}
