#[cfg(test)]
mod tests {
    use crate::*;

    fn aws() -> AwsSource {
        AwsSource { account_id: "999999999999".into() }
    }

    fn oidc() -> OidcSource {
        OidcSource {
            issuer_uri: "https://sts.windows.net/tenant".into(),
            allowed_audiences: vec![],
            jwks_json: None,
        }
    }

    fn x509() -> X509Source {
        X509Source {
            trust_store: TrustStore::new(vec![Certificate::new("pem")], vec![]),
        }
    }

    #[test]
    fn from_parts_accepts_exactly_one_block() {
        let src = CredentialSource::from_parts(Some(aws()), None, None).unwrap();
        assert_eq!(src.kind(), SourceKind::Aws);
        let src = CredentialSource::from_parts(None, Some(oidc()), None).unwrap();
        assert_eq!(src.kind(), SourceKind::Oidc);
        let src = CredentialSource::from_parts(None, None, Some(x509())).unwrap();
        assert_eq!(src.kind(), SourceKind::X509);
    }

    #[test]
    fn from_parts_rejects_zero_blocks() {
        let err = CredentialSource::from_parts(None, None, None).unwrap_err();
        match err {
            DomainError::ConflictingVariant { populated } => assert!(populated.is_empty()),
        }
    }

    #[test]
    fn from_parts_rejects_two_blocks() {
        let err = CredentialSource::from_parts(Some(aws()), None, Some(x509())).unwrap_err();
        match &err {
            DomainError::ConflictingVariant { populated } => {
                assert_eq!(populated, &vec![SourceKind::Aws, SourceKind::X509]);
            }
        }
        assert!(err.to_string().contains("aws, x509"));
    }

    #[test]
    fn default_mappings_per_variant() {
        let aws_default = CredentialSource::Aws(aws())
            .default_attribute_mapping()
            .unwrap();
        assert_eq!(aws_default["google.subject"], "assertion.arn");
        assert!(aws_default.contains_key("attribute.aws_role"));

        let x509_default = CredentialSource::X509(x509())
            .default_attribute_mapping()
            .unwrap();
        assert_eq!(x509_default["google.subject"], "assertion.subject.dn.cn");

        assert!(CredentialSource::Oidc(oidc())
            .default_attribute_mapping()
            .is_none());
    }

    #[test]
    fn effective_mapping_prefers_explicit_entries() {
        let mut cfg = ProviderConfiguration::new("pool", "prov", CredentialSource::Aws(aws()));
        assert_eq!(cfg.effective_attribute_mapping().len(), 2);

        cfg.attribute_mapping
            .insert("google.subject".into(), "assertion.account".into());
        let eff = cfg.effective_attribute_mapping();
        assert_eq!(eff.len(), 1);
        assert_eq!(eff["google.subject"], "assertion.account");
    }

    #[test]
    fn key_renders_as_pool_slash_provider() {
        let cfg = ProviderConfiguration::new("my-pool", "my-prov", CredentialSource::Aws(aws()));
        assert_eq!(cfg.key().to_string(), "my-pool/my-prov");
    }

    #[test]
    fn replacement_fields() {
        assert_eq!(Field::ProviderId.change_kind(), ChangeKind::RequiresReplace);
        assert_eq!(Field::PoolId.change_kind(), ChangeKind::RequiresReplace);
        assert_eq!(Field::CredentialSource.change_kind(), ChangeKind::RequiresReplace);
        assert_eq!(Field::Disabled.change_kind(), ChangeKind::InPlace);
        assert_eq!(Field::AwsAccountId.change_kind(), ChangeKind::InPlace);
        assert_eq!(Field::X509TrustAnchors.change_kind(), ChangeKind::InPlace);
    }

    #[test]
    fn update_mask_is_deduplicated() {
        let cfg = ProviderConfiguration::new("pool", "prov", CredentialSource::X509(x509()));
        let set = ChangeSet {
            key: cfg.key(),
            desired: cfg,
            changes: vec![
                FieldChange::new(Field::AttributeMapping("a".into()), None, Some("x".into())),
                FieldChange::new(Field::AttributeMapping("b".into()), Some("y".into()), None),
                FieldChange::new(Field::X509TrustAnchors, None, None),
                FieldChange::new(Field::X509IntermediateCas, None, None),
            ],
        };
        assert_eq!(set.update_mask(), vec!["attributeMapping", "x509"]);
        assert!(!set.requires_replace());
    }

    #[test]
    fn credential_source_yaml_shape_is_externally_tagged() {
        let src = CredentialSource::Aws(aws());
        let json = serde_json::to_value(&src).unwrap();
        assert_eq!(json["aws"]["account_id"], "999999999999");
    }
}
