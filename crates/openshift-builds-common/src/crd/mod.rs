//! Custom Resource Definitions for the OpenShift Builds operator
//!
//! The operator owns a single kind, `OpenShiftBuild`. Its shared types
//! (conditions and declared component states) live in `types`.

mod openshift_build;
mod types;

pub use openshift_build::{
    ComponentConfig, OpenShiftBuild, OpenShiftBuildSpec, OpenShiftBuildStatus,
    SharedResourceConfig, ShipwrightConfig, CONDITION_READY,
};
pub use types::{find_condition, set_condition, ComponentState, Condition, ConditionStatus};
