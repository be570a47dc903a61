use serde_json::json;
use wipp_domain::{ChangeKind, FieldChange, ProviderKey};
use wipp_reconciler::{LifecycleReport, PlanAction, ReconcileError, ReconcileReport};

type Results = [(ProviderKey, Result<ReconcileReport, ReconcileError>)];

/// Render reconcile results as human-readable text.
pub fn render_results(results: &Results) -> String {
    let mut out = String::new();
    let mut changed = 0;
    for (key, result) in results {
        match result {
            Ok(report) => {
                let prefix = match report.action {
                    PlanAction::Create => "+",
                    PlanAction::Update => "~",
                    PlanAction::Replace => "-/+",
                    PlanAction::NoChange => "=",
                };
                if report.action != PlanAction::NoChange {
                    changed += 1;
                }
                out.push_str(&format!("{} {} ({})\n", prefix, key, report.action));
                for change in &report.changes {
                    out.push_str(&render_change(change));
                }
            }
            Err(e) => out.push_str(&format!("! {}: {}\n", key, e)),
        }
    }

    let dry_run = results
        .iter()
        .any(|(_, r)| matches!(r, Ok(report) if report.dry_run));
    out.push_str(&format!(
        "{} provider(s), {} to change{}.\n",
        results.len(),
        changed,
        if dry_run { " (dry run)" } else { "" }
    ));
    out
}

fn render_change(change: &FieldChange) -> String {
    let value = |v: &Option<String>| v.clone().unwrap_or_else(|| "<unset>".into());
    let marker = match change.kind {
        ChangeKind::InPlace => "~",
        ChangeKind::RequiresReplace => "!",
    };
    let suffix = match change.kind {
        ChangeKind::InPlace => String::new(),
        ChangeKind::RequiresReplace => format!(" ({})", change.kind),
    };
    format!(
        "    {} {}: {} -> {}{}\n",
        marker,
        change.field,
        value(&change.before),
        value(&change.after),
        suffix
    )
}

pub fn results_json(results: &Results) -> serde_json::Result<String> {
    let entries: Vec<serde_json::Value> = results
        .iter()
        .map(|(key, result)| match result {
            Ok(report) => json!({ "key": key, "report": report }),
            Err(e) => json!({ "key": key, "error": e.to_string() }),
        })
        .collect();
    serde_json::to_string_pretty(&entries)
}

pub fn render_lifecycle(report: &LifecycleReport) -> String {
    let mut out = format!("run {} for {}\n", report.run_id, report.key);
    for t in &report.transitions {
        out.push_str(&format!("  {}  {}\n", t.at.to_rfc3339(), t.to));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipp_domain::Field;

    fn report(action: PlanAction, changes: Vec<FieldChange>) -> ReconcileReport {
        let mut r = ReconcileReport::new(ProviderKey::new("my-pool", "my-provider"), true, action);
        r.changes = changes;
        r
    }

    #[test]
    fn renders_actions_and_field_changes() {
        let results = vec![
            (
                ProviderKey::new("my-pool", "my-provider"),
                Ok(report(
                    PlanAction::Update,
                    vec![FieldChange::new(
                        Field::Disabled,
                        Some("false".into()),
                        Some("true".into()),
                    )],
                )),
            ),
            (
                ProviderKey::new("my-pool", "other"),
                Ok(report(
                    PlanAction::Replace,
                    vec![FieldChange::new(
                        Field::CredentialSource,
                        Some("aws".into()),
                        Some("oidc".into()),
                    )],
                )),
            ),
            (
                ProviderKey::new("my-pool", "broken"),
                Err(ReconcileError::NotFound(ProviderKey::new("my-pool", "broken"))),
            ),
        ];

        let text = render_results(&results);
        assert!(text.contains("~ my-pool/my-provider (update)\n    ~ disabled: false -> true\n"));
        assert!(text.contains("-/+ my-pool/other (replace)"));
        assert!(text.contains("! credential_source: aws -> oidc (requires replace)"));
        assert!(text.contains("! my-pool/broken: provider not found"));
        assert!(text.ends_with("3 provider(s), 2 to change (dry run).\n"));
    }

    #[test]
    fn json_output_carries_errors_as_strings() {
        let results = vec![(
            ProviderKey::new("my-pool", "broken"),
            Err(ReconcileError::NotFound(ProviderKey::new("my-pool", "broken"))),
        )];
        let value: serde_json::Value =
            serde_json::from_str(&results_json(&results).unwrap()).unwrap();
        assert_eq!(value[0]["key"]["provider_id"], "broken");
        assert!(value[0]["error"].as_str().unwrap().contains("not found"));
    }
}
