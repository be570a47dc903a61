pub mod diff;
pub mod error;
pub mod lifecycle;
pub mod reconcile;
pub mod report;

pub use diff::{compare, diff, diff_from, normalize};
pub use error::ReconcileError;
pub use lifecycle::{run_roundtrip, LifecycleVerifier};
pub use reconcile::{apply, reconcile, reconcile_all};
pub use report::{
    LifecycleReport, LifecycleState, Mismatch, PlanAction, ReconcileReport, ReconcileRequest,
    Transition,
};
