use kube::api::DynamicObject;

use openshift_builds_common::crd::OpenShiftBuild;
use openshift_builds_common::{Result, OWNER_FINALIZER};

use super::Component;
use crate::controller::{DisabledPolicy, LifecycleAction};
use crate::manifest::Manifest;
use crate::transform::{
    ImageMapping, InjectContainerImages, InjectFinalizer, InjectNamespace, InjectOwner, Pipeline,
};

/// Shared Resource CSI driver and its supporting objects, installed from
/// the manifests on disk.
#[derive(Clone, Debug)]
pub struct SharedResources {
    manifest: Manifest,
    namespace: String,
    disabled: DisabledPolicy,
}

impl SharedResources {
    /// Install `manifest` into `namespace`; Disabled only releases finalizers
    pub fn new(manifest: Manifest, namespace: impl Into<String>) -> Self {
        Self {
            manifest,
            namespace: namespace.into(),
            disabled: DisabledPolicy::StripOnly,
        }
    }

    /// Override what Disabled does
    pub fn with_disabled_policy(mut self, disabled: DisabledPolicy) -> Self {
        self.disabled = disabled;
        self
    }
}

impl Component for SharedResources {
    fn name(&self) -> &'static str {
        "SharedResource"
    }

    fn declared_state<'a>(&self, owner: &'a OpenShiftBuild) -> &'a str {
        owner.shared_resource_state()
    }

    fn disabled_policy(&self) -> DisabledPolicy {
        self.disabled
    }

    fn resources(
        &self,
        owner: &OpenShiftBuild,
        action: LifecycleAction,
        images: &ImageMapping,
    ) -> Result<Vec<DynamicObject>> {
        let mut pipeline = Pipeline::new();
        if action.is_apply() {
            pipeline = pipeline.with(InjectFinalizer::new(OWNER_FINALIZER));
        }
        pipeline
            .with(InjectOwner::for_owner(owner)?)
            .with(InjectNamespace::new(&self.namespace))
            .with(InjectContainerImages::new(images.clone()))
            .run(self.manifest.resources())
    }
}
