use std::sync::Arc;

use tracing::{debug, info, warn};
use wipp_domain::{ChangeSet, Field, ObservedProvider, ProviderConfiguration};
use wipp_service::IdentityService;
use wipp_validate::validate;

use crate::diff::{compare, diff_from, normalize};
use crate::error::ReconcileError;
use crate::reconcile::apply;
use crate::report::{LifecycleReport, LifecycleState};

/// Drives one provider through plan, apply, import, verify, update and
/// destroy against a live service, checking that what was applied reads
/// back unchanged.
///
/// ```text
/// Planned -> Applied -> Imported -> Verified -> (Updated -> Applied -> ...) -> Destroyed
/// ```
///
/// A call made in the wrong state fails with `InvalidTransition`. A failed
/// service call leaves the state where it was.
pub struct LifecycleVerifier {
    service:  Arc<dyn IdentityService>,
    desired:  ProviderConfiguration,
    state:    LifecycleState,
    applied:  Option<ObservedProvider>,
    imported: Option<ObservedProvider>,
    report:   LifecycleReport,
}

impl LifecycleVerifier {
    /// Validate `desired` locally. Nothing is sent to the service.
    pub fn plan(
        service: Arc<dyn IdentityService>,
        desired: ProviderConfiguration,
    ) -> Result<Self, ReconcileError> {
        let validated = validate(&desired)?;
        let desired = normalize(validated.config());

        let mut report = LifecycleReport::new(desired.key());
        report.record(None, LifecycleState::Planned);
        debug!(run_id = %report.run_id, provider = %desired.key(), "Lifecycle planned");

        Ok(Self {
            service,
            desired,
            state: LifecycleState::Planned,
            applied: None,
            imported: None,
            report,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn desired(&self) -> &ProviderConfiguration {
        &self.desired
    }

    pub fn applied(&self) -> Option<&ObservedProvider> {
        self.applied.as_ref()
    }

    pub fn imported(&self) -> Option<&ObservedProvider> {
        self.imported.as_ref()
    }

    pub fn report(&self) -> &LifecycleReport {
        &self.report
    }

    pub fn into_report(self) -> LifecycleReport {
        self.report
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<(), ReconcileError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ReconcileError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn enter(&mut self, to: LifecycleState) {
        debug!(run_id = %self.report.run_id, from = %self.state, %to, "Lifecycle transition");
        self.report.record(Some(self.state), to);
        self.state = to;
    }

    /// Create the provider and keep the returned state as the applied
    /// snapshot.
    pub async fn apply(&mut self) -> Result<&ObservedProvider, ReconcileError> {
        self.require("apply", &[LifecycleState::Planned])?;

        info!(provider = %self.desired.key(), "Applying provider");
        let observed = self.service.create(&self.desired).await?;
        self.applied = Some(observed);
        self.enter(LifecycleState::Applied);
        self.applied_snapshot()
    }

    /// Read the provider back by key alone.
    pub async fn import(&mut self) -> Result<&ObservedProvider, ReconcileError> {
        self.require(
            "import",
            &[
                LifecycleState::Applied,
                LifecycleState::Imported,
                LifecycleState::Verified,
            ],
        )?;

        let key = self.applied_snapshot()?.key();
        let observed = self
            .service
            .read(&key)
            .await
            .map_err(ReconcileError::from_service)?;
        self.imported = Some(observed);
        self.enter(LifecycleState::Imported);
        self.imported
            .as_ref()
            .ok_or_else(|| ReconcileError::Internal("imported state missing".into()))
    }

    /// Compare the imported state with the applied one, skipping `ignore` and
    /// the fields the credential source cannot round-trip.
    pub fn verify(&mut self, ignore: &[Field]) -> Result<(), ReconcileError> {
        self.require("verify", &[LifecycleState::Imported])?;

        let applied = self.applied_snapshot()?;
        let imported = self
            .imported
            .as_ref()
            .ok_or_else(|| ReconcileError::Internal("imported state missing".into()))?;

        let mismatches = compare(&applied.config, &imported.config, ignore);
        if !mismatches.is_empty() {
            warn!(provider = %applied.key(), count = mismatches.len(), "Verification failed");
            return Err(ReconcileError::VerificationMismatch {
                key: applied.key(),
                mismatches,
            });
        }
        self.enter(LifecycleState::Verified);
        Ok(())
    }

    /// Move to a new desired configuration. The change set is computed
    /// against the applied snapshot and returned once applied. A `jwks_json`
    /// pinned by the previous configuration and omitted now is cleared.
    ///
    /// Replacement is delete then create. If the create fails the state stays
    /// `Applied` but the snapshot names a provider that is gone: a later
    /// `import` or `destroy` returns `NotFound`.
    pub async fn update(
        &mut self,
        desired: ProviderConfiguration,
    ) -> Result<ChangeSet, ReconcileError> {
        self.require("update", &[LifecycleState::Applied, LifecycleState::Verified])?;

        let validated = validate(&desired)?;
        let change_set = diff_from(
            validated.config(),
            self.applied_snapshot()?,
            Some(&self.desired),
        );
        info!(
            provider = %change_set.key,
            changes = change_set.changes.len(),
            replace = change_set.requires_replace(),
            "Updating provider"
        );

        let observed = apply(&change_set, self.service.as_ref()).await?;
        self.desired = change_set.desired.clone();
        self.applied = Some(observed);
        self.imported = None;
        self.enter(LifecycleState::Updated);
        self.enter(LifecycleState::Applied);
        Ok(change_set)
    }

    /// Delete the provider and confirm the service no longer reports it.
    pub async fn destroy(&mut self) -> Result<(), ReconcileError> {
        self.require(
            "destroy",
            &[
                LifecycleState::Applied,
                LifecycleState::Imported,
                LifecycleState::Verified,
            ],
        )?;

        let key = self.applied_snapshot()?.key();
        info!(provider = %key, "Destroying provider");
        self.service
            .delete(&key)
            .await
            .map_err(ReconcileError::from_service)?;

        match self.service.read(&key).await {
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
            Ok(still_there) => {
                return Err(ReconcileError::Internal(format!(
                    "{} still reported after delete ({})",
                    key, still_there.name
                )))
            }
        }

        self.applied = None;
        self.imported = None;
        self.enter(LifecycleState::Destroyed);
        Ok(())
    }

    fn applied_snapshot(&self) -> Result<&ObservedProvider, ReconcileError> {
        self.applied
            .as_ref()
            .ok_or_else(|| ReconcileError::Internal("applied state missing".into()))
    }
}

/// Run the full round trip over a sequence of configurations for one
/// provider: apply the first, import and verify; for each later one update,
/// import and verify; finally destroy.
///
/// On failure the provider is destroyed on a best-effort basis and the
/// original error is returned.
pub async fn run_roundtrip(
    service: Arc<dyn IdentityService>,
    steps: &[ProviderConfiguration],
    ignore: &[Field],
) -> Result<LifecycleReport, ReconcileError> {
    let (first, rest) = steps
        .split_first()
        .ok_or_else(|| ReconcileError::Internal("round trip needs at least one step".into()))?;

    let mut verifier = LifecycleVerifier::plan(service, first.clone())?;
    let outcome = drive(&mut verifier, rest, ignore).await;

    if let Err(e) = outcome {
        if matches!(
            verifier.state(),
            LifecycleState::Applied | LifecycleState::Imported | LifecycleState::Verified
        ) {
            if let Err(cleanup) = verifier.destroy().await {
                warn!(error = %cleanup, "Cleanup after failed round trip also failed");
            }
        }
        return Err(e);
    }

    info!(
        run_id = %verifier.report().run_id,
        steps = steps.len(),
        "Round trip verified"
    );
    Ok(verifier.into_report())
}

async fn drive(
    verifier: &mut LifecycleVerifier,
    rest: &[ProviderConfiguration],
    ignore: &[Field],
) -> Result<(), ReconcileError> {
    verifier.apply().await?;
    verifier.import().await?;
    verifier.verify(ignore)?;

    for step in rest {
        verifier.update(step.clone()).await?;
        verifier.import().await?;
        verifier.verify(ignore)?;
    }

    verifier.destroy().await
}
