use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::json;

use openshift_builds_common::crd::OpenShiftBuild;
use openshift_builds_common::kube_utils::dynamic_object_from_value;
use openshift_builds_common::Result;

use super::Component;
use crate::controller::{DisabledPolicy, LifecycleAction};
use crate::transform::{ImageMapping, InjectOwner, Pipeline};

/// apiVersion of the Shipwright operator's install resource
pub const SHIPWRIGHT_API_VERSION: &str = "operator.shipwright.io/v1alpha1";

/// Type information for watching ShipwrightBuild as a dynamic object
pub fn shipwright_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "operator.shipwright.io",
        "v1alpha1",
        "ShipwrightBuild",
    ))
}

/// The Shipwright build subsystem, installed through a single cluster-scoped
/// `ShipwrightBuild` handled by the Shipwright operator.
///
/// The resource carries no finalizer; it is owned by the OpenShiftBuild and
/// collected with it.
#[derive(Clone, Debug)]
pub struct ShipwrightBuild {
    target_namespace: String,
}

impl ShipwrightBuild {
    /// Install Shipwright into `target_namespace`
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
        }
    }

    fn template(&self) -> Result<DynamicObject> {
        dynamic_object_from_value(json!({
            "apiVersion": SHIPWRIGHT_API_VERSION,
            "kind": "ShipwrightBuild",
            "metadata": {
                "name": self.target_namespace,
            },
            "spec": {
                "targetNamespace": self.target_namespace,
            }
        }))
    }
}

impl Component for ShipwrightBuild {
    fn name(&self) -> &'static str {
        "ShipwrightBuild"
    }

    fn declared_state<'a>(&self, owner: &'a OpenShiftBuild) -> &'a str {
        owner.shipwright_build_state()
    }

    fn disabled_policy(&self) -> DisabledPolicy {
        DisabledPolicy::Delete
    }

    fn resources(
        &self,
        owner: &OpenShiftBuild,
        _action: LifecycleAction,
        _images: &ImageMapping,
    ) -> Result<Vec<DynamicObject>> {
        Pipeline::new()
            .with(InjectOwner::for_owner(owner)?)
            .run(&[self.template()?])
    }
}
