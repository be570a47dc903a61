use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wipp_domain::{Field, FieldChange, ObservedProvider, ProviderConfiguration, ProviderKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub config: ProviderConfiguration,
    pub dry_run: bool,
}

/// What reconciling one provider does (or would do, in a dry run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    /// Delete the existing provider and create the desired one.
    Replace,
    NoChange,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::Create => write!(f, "create"),
            PlanAction::Update => write!(f, "update"),
            PlanAction::Replace => write!(f, "replace"),
            PlanAction::NoChange => write!(f, "no change"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub key: ProviderKey,
    pub dry_run: bool,
    pub action: PlanAction,
    pub changes: Vec<FieldChange>,
    /// State after applying; `None` for dry runs of a create.
    pub observed: Option<ObservedProvider>,
}

impl ReconcileReport {
    pub fn new(key: ProviderKey, dry_run: bool, action: PlanAction) -> Self {
        Self {
            key,
            dry_run,
            action,
            changes: Vec::new(),
            observed: None,
        }
    }
}

/// A field whose imported value differs from the applied one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub field: Field,
    pub expected: Option<String>,
    pub observed: Option<String>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: expected {}, observed {}",
            self.field,
            self.expected.as_deref().unwrap_or("<unset>"),
            self.observed.as_deref().unwrap_or("<unset>"),
        )
    }
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Planned,
    Applied,
    Imported,
    Verified,
    Updated,
    Destroyed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Planned => "planned",
            LifecycleState::Applied => "applied",
            LifecycleState::Imported => "imported",
            LifecycleState::Verified => "verified",
            LifecycleState::Updated => "updated",
            LifecycleState::Destroyed => "destroyed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: Option<LifecycleState>,
    pub to: LifecycleState,
    pub at: DateTime<Utc>,
}

/// Every state a verifier run passed through, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub run_id: Uuid,
    pub key: ProviderKey,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<Transition>,
}

impl LifecycleReport {
    pub fn new(key: ProviderKey) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            key,
            started_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    pub fn record(&mut self, from: Option<LifecycleState>, to: LifecycleState) {
        self.transitions.push(Transition {
            from,
            to,
            at: Utc::now(),
        });
    }

    /// The sequence of states entered.
    pub fn states(&self) -> Vec<LifecycleState> {
        self.transitions.iter().map(|t| t.to).collect()
    }
}
