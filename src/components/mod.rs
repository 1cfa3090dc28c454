//! Sub-components installed on behalf of an OpenShiftBuild
//!
//! Each component knows which part of the owner's spec declares its state,
//! what to do when it is Disabled, and how to turn the owner into concrete
//! resources for a given lifecycle action.

mod sharedresource;
mod shipwright;

use std::sync::Arc;

use kube::api::DynamicObject;

use openshift_builds_common::crd::OpenShiftBuild;
use openshift_builds_common::Result;

use crate::config::OperatorConfig;
use crate::controller::{DisabledPolicy, LifecycleAction};
use crate::manifest::Manifest;
use crate::transform::ImageMapping;

pub use sharedresource::SharedResources;
pub use shipwright::{shipwright_api_resource, ShipwrightBuild, SHIPWRIGHT_API_VERSION};

/// A sub-component reconciled for every owner
pub trait Component: Send + Sync {
    /// Name used in logs, errors and the owner's condition message
    fn name(&self) -> &'static str;

    /// State declared for this component on the owner, verbatim
    fn declared_state<'a>(&self, owner: &'a OpenShiftBuild) -> &'a str;

    /// What happens to the resources while the component is Disabled
    fn disabled_policy(&self) -> DisabledPolicy;

    /// Concrete resources to hand to the engine for `action`
    fn resources(
        &self,
        owner: &OpenShiftBuild,
        action: LifecycleAction,
        images: &ImageMapping,
    ) -> Result<Vec<DynamicObject>>;
}

/// The components of a running operator, in reconcile order
pub fn default_components(config: &OperatorConfig, manifest: Manifest) -> Vec<Arc<dyn Component>> {
    let disabled = if config.delete_disabled_shared_resources {
        DisabledPolicy::Delete
    } else {
        DisabledPolicy::StripOnly
    };

    vec![
        Arc::new(ShipwrightBuild::new(&config.namespace)),
        Arc::new(SharedResources::new(manifest, &config.namespace).with_disabled_policy(disabled)),
    ]
}
