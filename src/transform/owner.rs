use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::Resource;

use openshift_builds_common::crd::OpenShiftBuild;
use openshift_builds_common::{Error, Result};

use super::{reject, Transform};

/// Points the resource's controller owner reference at the owner so the
/// garbage collector removes it when the owner goes away.
#[derive(Clone, Debug)]
pub struct InjectOwner {
    owner: OwnerReference,
}

impl InjectOwner {
    /// Use an explicit owner reference
    pub fn new(owner: OwnerReference) -> Self {
        Self { owner }
    }

    /// Reference `owner` as controller, blocking its deletion until the
    /// dependent is gone. The owner must have been read from the store.
    pub fn for_owner(owner: &OpenShiftBuild) -> Result<Self> {
        owner
            .controller_owner_ref(&())
            .map(Self::new)
            .ok_or_else(|| Error::internal_with_context("InjectOwner", "owner has no uid"))
    }
}

impl Transform for InjectOwner {
    fn name(&self) -> &'static str {
        "InjectOwner"
    }

    fn transform(&self, obj: &mut DynamicObject) -> Result<()> {
        let refs = obj.metadata.owner_references.get_or_insert_with(Vec::new);

        if let Some(existing) = refs.iter_mut().find(|r| r.uid == self.owner.uid) {
            *existing = self.owner.clone();
            return Ok(());
        }

        if self.owner.controller == Some(true) {
            if let Some(other) = refs.iter().find(|r| r.controller == Some(true)) {
                let message = format!("already controlled by {} {}", other.kind, other.name);
                return Err(reject(self, obj, message));
            }
        }

        refs.push(self.owner.clone());
        Ok(())
    }
}
