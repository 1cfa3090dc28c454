//! OpenShiftBuild controller
//!
//! One reconcile converges every sub-component of a single owner:
//! decide each component's action, transform its templates, run the engine,
//! then report the outcome in the owner's `Ready` condition.

mod client;
mod lifecycle;
mod reconcile;

pub use client::{OwnerClient, OwnerClientImpl};
pub use lifecycle::{decide, DisabledPolicy, LifecycleAction};
pub use reconcile::{
    error_policy, reconcile, reconcile_owner, Context, ContextBuilder, ReconcileOutcome,
    INITIALIZING_MESSAGE, SUCCESS_MESSAGE,
};

#[cfg(test)]
pub(crate) use client::MockOwnerClient;
