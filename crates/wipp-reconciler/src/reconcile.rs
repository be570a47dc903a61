use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wipp_domain::{ChangeSet, ObservedProvider, ProviderConfiguration, ProviderKey};
use wipp_service::{IdentityService, ServiceError};
use wipp_validate::validate;

use crate::diff::{diff, normalize};
use crate::error::ReconcileError;
use crate::report::{PlanAction, ReconcileReport, ReconcileRequest};

/// Carry out a change set.
///
/// `desired` is validated again before anything is sent. An empty change
/// set only reads the current state back.
pub async fn apply(
    change_set: &ChangeSet,
    service: &dyn IdentityService,
) -> Result<ObservedProvider, ReconcileError> {
    validate(&change_set.desired)?;

    if change_set.is_empty() {
        debug!(provider = %change_set.key, "No changes to apply");
        return Ok(service.read(&change_set.key).await?);
    }

    if change_set.requires_replace() {
        info!(
            provider = %change_set.key,
            replacement = %change_set.desired.key(),
            "Replacing provider"
        );
        service.delete(&change_set.key).await?;
        return Ok(service.create(&change_set.desired).await?);
    }

    info!(
        provider = %change_set.key,
        update_mask = ?change_set.update_mask(),
        "Updating provider in place"
    );
    Ok(service.update(&change_set.key, change_set).await?)
}

/// Bring one provider to its desired configuration.
///
/// Validation happens before any service call. A provider the backend does
/// not know is created; otherwise the diff is applied. With `dry_run` the
/// report describes the plan and nothing is changed.
pub async fn reconcile(
    req: ReconcileRequest,
    service: &dyn IdentityService,
) -> Result<ReconcileReport, ReconcileError> {
    let validated = validate(&req.config)?;
    let desired = normalize(validated.config());
    let key = desired.key();

    let current = match service.read(&key).await {
        Ok(observed) => Some(observed),
        Err(ServiceError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let Some(current) = current else {
        let mut report = ReconcileReport::new(key.clone(), req.dry_run, PlanAction::Create);
        if !req.dry_run {
            info!(provider = %key, source = %desired.credential_source.kind(), "Creating provider");
            report.observed = Some(service.create(&desired).await?);
        }
        return Ok(report);
    };

    let change_set = diff(&desired, &current);
    let action = if change_set.is_empty() {
        PlanAction::NoChange
    } else if change_set.requires_replace() {
        PlanAction::Replace
    } else {
        PlanAction::Update
    };
    debug!(provider = %key, %action, changes = change_set.changes.len(), "Planned");

    let mut report = ReconcileReport::new(key, req.dry_run, action);
    report.changes = change_set.changes.clone();
    report.observed = if req.dry_run || action == PlanAction::NoChange {
        Some(current)
    } else {
        Some(apply(&change_set, service).await?)
    };
    Ok(report)
}

/// Reconcile several providers, each key in its own task.
///
/// Duplicate keys are rejected before any service call. Results come back in
/// input order; one provider failing does not stop the others.
pub async fn reconcile_all(
    configs: Vec<ProviderConfiguration>,
    service: Arc<dyn IdentityService>,
    dry_run: bool,
) -> Result<Vec<(ProviderKey, Result<ReconcileReport, ReconcileError>)>, ReconcileError> {
    let mut seen = HashSet::new();
    for config in &configs {
        let key = config.key();
        if !seen.insert(key.clone()) {
            return Err(ReconcileError::DuplicateKey(key));
        }
    }

    let keys: Vec<ProviderKey> = configs.iter().map(|c| c.key()).collect();
    let mut tasks = JoinSet::new();
    for (index, config) in configs.into_iter().enumerate() {
        let service = service.clone();
        tasks.spawn(async move {
            let req = ReconcileRequest { config, dry_run };
            (index, reconcile(req, service.as_ref()).await)
        });
    }

    let mut results: Vec<Option<Result<ReconcileReport, ReconcileError>>> =
        keys.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    warn!(provider = %keys[index], error = %e, "Reconcile failed");
                }
                results[index] = Some(result);
            }
            Err(e) => return Err(ReconcileError::Internal(format!("reconcile task: {}", e))),
        }
    }

    Ok(keys
        .into_iter()
        .zip(results)
        .map(|(key, result)| {
            let result = result.unwrap_or_else(|| {
                Err(ReconcileError::Internal(format!("no result for {}", key)))
            });
            (key, result)
        })
        .collect())
}
