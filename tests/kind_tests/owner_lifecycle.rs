//! Integration tests for the reconcile lifecycle
//!
//! The build subsystem CRD is not available on a plain kind cluster, so
//! these stories reconcile the shared resource component alone.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tokio_util::sync::CancellationToken;

use openshift_builds::common::crd::{
    find_condition, ConditionStatus, OpenShiftBuild, OpenShiftBuildSpec, SharedResourceConfig,
    CONDITION_READY,
};
use openshift_builds::common::kube_utils::{dynamic_object_from_value, KubeStore};
use openshift_builds::common::OWNER_FINALIZER;
use openshift_builds::components::SharedResources;
use openshift_builds::controller::{
    reconcile_owner, Context, DisabledPolicy, OwnerClientImpl, ReconcileOutcome,
};
use openshift_builds::manifest::Manifest;

use super::helpers::{cleanup_owner, ensure_namespace, ensure_test_cluster};

const OWNER: &str = "kind-lifecycle";
const NAMESPACE: &str = "openshift-builds-kind";
const CONFIG_MAP: &str = "kind-shared-config";

fn manifest() -> Manifest {
    let cm = dynamic_object_from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": CONFIG_MAP},
        "data": {"mode": "shared"}
    }))
    .expect("valid template");
    Manifest::from_resources(vec![cm])
}

async fn context(client: &Client) -> Context {
    let store = KubeStore::new(client.clone())
        .await
        .expect("discovery should succeed");
    Context::builder(Arc::new(OwnerClientImpl::new(client.clone())), Arc::new(store))
        .component(Arc::new(
            SharedResources::new(manifest(), NAMESPACE).with_disabled_policy(DisabledPolicy::StripOnly),
        ))
        .call_timeout(Duration::from_secs(10))
        .build()
}

async fn set_shared_state(api: &Api<OpenShiftBuild>, state: &str) {
    let mut owner = api.get(OWNER).await.expect("owner exists");
    owner.spec.shared_resource = Some(SharedResourceConfig {
        state: state.to_string(),
    });
    api.replace(OWNER, &PostParams::default(), &owner)
        .await
        .expect("replace should succeed");
}

/// Story: an administrator enables, disables and finally removes the operator
///
/// Expected behavior:
/// - Enabled: the shared ConfigMap appears in the target namespace, owned
///   by the OpenShiftBuild and protected by the operator finalizer
/// - Disabled: the finalizer is released but the ConfigMap keeps running
/// - Deleted: the owner finalizer is removed and the owner disappears
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_owner_enable_disable_delete() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    ensure_namespace(&client, NAMESPACE)
        .await
        .expect("namespace should exist");
    cleanup_owner(&client, OWNER).await;

    let owners: Api<OpenShiftBuild> = Api::all(client.clone());
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), NAMESPACE);
    owners
        .create(
            &PostParams::default(),
            &OpenShiftBuild::new(
                OWNER,
                OpenShiftBuildSpec {
                    shipwright: None,
                    shared_resource: Some(SharedResourceConfig {
                        state: "Enabled".to_string(),
                    }),
                },
            ),
        )
        .await
        .expect("create should succeed");

    let ctx = context(&client).await;
    let cancel = CancellationToken::new();

    // Enabled
    let outcome = reconcile_owner(OWNER, &ctx, &cancel)
        .await
        .expect("reconcile should succeed");
    assert_eq!(outcome, ReconcileOutcome::Converged);

    let cm = config_maps.get(CONFIG_MAP).await.expect("ConfigMap applied");
    assert_eq!(
        cm.metadata.finalizers,
        Some(vec![OWNER_FINALIZER.to_string()])
    );
    let refs = cm.metadata.owner_references.expect("owner reference");
    assert_eq!(refs[0].name, OWNER);

    let owner = owners.get(OWNER).await.expect("owner exists");
    assert!(owner.has_finalizer(OWNER_FINALIZER));
    let ready = find_condition(owner.conditions(), CONDITION_READY).expect("Ready condition");
    assert_eq!(ready.status, ConditionStatus::True);

    // Disabled
    set_shared_state(&owners, "Disabled").await;
    reconcile_owner(OWNER, &ctx, &cancel)
        .await
        .expect("reconcile should succeed");
    let cm = config_maps.get(CONFIG_MAP).await.expect("ConfigMap kept");
    assert!(cm.metadata.finalizers.unwrap_or_default().is_empty());

    // Deleted
    owners
        .delete(OWNER, &DeleteParams::default())
        .await
        .expect("delete should be accepted");
    let outcome = reconcile_owner(OWNER, &ctx, &cancel)
        .await
        .expect("reconcile should succeed");
    assert_eq!(outcome, ReconcileOutcome::Released);
    assert!(owners.get_opt(OWNER).await.expect("get").is_none());

    let _ = config_maps.delete(CONFIG_MAP, &DeleteParams::default()).await;
}

/// Story: an administrator mistypes the state
///
/// Expected behavior:
/// - Nothing is applied
/// - The Ready condition explains what is wrong
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_invalid_state_is_reported() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    ensure_namespace(&client, NAMESPACE)
        .await
        .expect("namespace should exist");
    cleanup_owner(&client, OWNER).await;

    let owners: Api<OpenShiftBuild> = Api::all(client.clone());
    owners
        .create(
            &PostParams::default(),
            &OpenShiftBuild::new(
                OWNER,
                OpenShiftBuildSpec {
                    shipwright: None,
                    shared_resource: Some(SharedResourceConfig {
                        state: "enabled".to_string(),
                    }),
                },
            ),
        )
        .await
        .expect("create should succeed");

    let ctx = context(&client).await;
    let err = reconcile_owner(OWNER, &ctx, &CancellationToken::new())
        .await
        .expect_err("reconcile should fail");
    assert!(!err.is_retryable());

    let owner = owners.get(OWNER).await.expect("owner exists");
    let ready = find_condition(owner.conditions(), CONDITION_READY).expect("Ready condition");
    assert_eq!(ready.status, ConditionStatus::False);
    assert!(ready.message.contains("\"enabled\""));

    cleanup_owner(&client, OWNER).await;
}
