//! Lifecycle decisions for sub-components
//!
//! Maps a sub-component's declared state and the owner's deletion status to
//! the action the engine performs. Deciding is pure; nothing is written.

use openshift_builds_common::crd::ComponentState;
use openshift_builds_common::Result;

/// What a Disabled sub-component does to its resources
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisabledPolicy {
    /// Release the resources (clear finalizers) and leave them in place
    StripOnly,
    /// Release the resources, then delete them
    Delete,
}

/// Action performed on a sub-component's resources in one pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Create or update every resource, finalizer included
    Apply,
    /// Clear finalizers, leave resources in place
    StripFinalizers,
    /// Clear finalizers, then delete the resources
    StripAndDelete,
}

impl LifecycleAction {
    /// Whether this action installs resources (and so injects finalizers)
    pub fn is_apply(self) -> bool {
        matches!(self, Self::Apply)
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::StripFinalizers => write!(f, "strip-finalizers"),
            Self::StripAndDelete => write!(f, "strip-and-delete"),
        }
    }
}

/// Decide the action for `component`.
///
/// | declared  | deleting | action                         |
/// |-----------|----------|--------------------------------|
/// | Enabled   | no       | apply                          |
/// | Disabled  | no       | strip (delete if policy says)  |
/// | anything  | yes      | strip                          |
/// | unknown   | no       | `InvalidState` error           |
///
/// A deleting owner is always released, even when its declared state is
/// unreadable, so that a typo cannot pin the owner behind its finalizer.
pub fn decide(
    component: &str,
    declared: &str,
    deleting: bool,
    disabled: DisabledPolicy,
) -> Result<LifecycleAction> {
    if deleting {
        return Ok(LifecycleAction::StripFinalizers);
    }
    match ComponentState::parse(component, declared)? {
        ComponentState::Enabled => Ok(LifecycleAction::Apply),
        ComponentState::Disabled => Ok(match disabled {
            DisabledPolicy::StripOnly => LifecycleAction::StripFinalizers,
            DisabledPolicy::Delete => LifecycleAction::StripAndDelete,
        }),
    }
}
