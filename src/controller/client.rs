//! Access to the OpenShiftBuild owner resource

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;

use openshift_builds_common::crd::{OpenShiftBuild, OpenShiftBuildStatus};
use openshift_builds_common::{Error, FIELD_MANAGER};

/// Operations on OpenShiftBuild resources, abstracted for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OwnerClient: Send + Sync {
    /// Get an OpenShiftBuild by name
    async fn get(&self, name: &str) -> Result<Option<OpenShiftBuild>, Error>;

    /// Create an OpenShiftBuild
    async fn create(&self, owner: &OpenShiftBuild) -> Result<OpenShiftBuild, Error>;

    /// Replace an OpenShiftBuild (spec and metadata)
    async fn replace(&self, owner: &OpenShiftBuild) -> Result<OpenShiftBuild, Error>;

    /// Set the finalizer list of an OpenShiftBuild
    async fn patch_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<(), Error>;

    /// Write the status subresource of an OpenShiftBuild
    async fn patch_status(&self, name: &str, status: &OpenShiftBuildStatus) -> Result<(), Error>;
}

/// [`OwnerClient`] backed by the Kubernetes API
pub struct OwnerClientImpl {
    client: Client,
}

impl OwnerClientImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self) -> Api<OpenShiftBuild> {
        Api::all(self.client.clone())
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl OwnerClient for OwnerClientImpl {
    async fn get(&self, name: &str) -> Result<Option<OpenShiftBuild>, Error> {
        Ok(self.api().get_opt(name).await?)
    }

    async fn create(&self, owner: &OpenShiftBuild) -> Result<OpenShiftBuild, Error> {
        Ok(self.api().create(&post_params(), owner).await?)
    }

    async fn replace(&self, owner: &OpenShiftBuild) -> Result<OpenShiftBuild, Error> {
        let name = owner
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal_with_context("owner-client", "owner has no name"))?;
        Ok(self.api().replace(name, &post_params(), owner).await?)
    }

    async fn patch_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        self.api()
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_status(&self, name: &str, status: &OpenShiftBuildStatus) -> Result<(), Error> {
        let patch = serde_json::json!({
            "status": status
        });

        self.api()
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
