//! Shared setup for cluster tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use openshift_builds::common::crd::OpenShiftBuild;

const FIELD_MANAGER: &str = "openshift-builds-kind-tests";

/// Connect to the current cluster and install the OpenShiftBuild CRD
pub async fn ensure_test_cluster() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        "openshiftbuilds.operator.openshift.io",
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&OpenShiftBuild::crd()),
    )
    .await?;

    // The CRD takes a moment to be served
    for _ in 0..30 {
        let owners: Api<OpenShiftBuild> = Api::all(client.clone());
        if owners.list(&Default::default()).await.is_ok() {
            return Ok(client);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    anyhow::bail!("OpenShiftBuild CRD was not established in time")
}

/// Create `name` as a namespace if it does not exist
pub async fn ensure_namespace(client: &Client, name: &str) -> anyhow::Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns: Namespace = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": name}
    }))?;
    namespaces
        .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&ns))
        .await?;
    Ok(())
}

/// Remove an owner left over from an earlier run, finalizers included
pub async fn cleanup_owner(client: &Client, name: &str) {
    let owners: Api<OpenShiftBuild> = Api::all(client.clone());
    let patch = serde_json::json!({"metadata": {"finalizers": null}});
    let _ = owners
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await;
    let _ = owners.delete(name, &DeleteParams::default()).await;
}
