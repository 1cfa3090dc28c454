//! Integration tests for OpenShiftBuild CRD operations
//!
//! These tests tell the story of how the default OpenShiftBuild comes to
//! exist on a cluster and how user edits survive the startup bootstrap.

use kube::api::{Api, PostParams};
use kube::ResourceExt;

use openshift_builds::bootstrap::{bootstrap, BootstrapOutcome};
use openshift_builds::common::crd::{OpenShiftBuild, OpenShiftBuildSpec, SharedResourceConfig};
use openshift_builds::common::retry::RetryConfig;
use openshift_builds::common::{DEFAULT_OWNER_NAME, OWNER_FINALIZER};
use openshift_builds::controller::OwnerClientImpl;

use super::helpers::{cleanup_owner, ensure_test_cluster};

/// Story: the operator starts on a fresh cluster
///
/// Expected behavior:
/// - The default OpenShiftBuild named `cluster` is created
/// - Both sub-components are declared Enabled explicitly
/// - The owner finalizer is present from the start
/// - A restart does not touch it again
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_bootstraps_default_owner() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    cleanup_owner(&client, DEFAULT_OWNER_NAME).await;

    let owners = OwnerClientImpl::new(client.clone());
    let outcome = bootstrap(&owners, &RetryConfig::with_max_attempts(3))
        .await
        .expect("bootstrap should succeed");
    assert_eq!(outcome, BootstrapOutcome::Created);

    let api: Api<OpenShiftBuild> = Api::all(client.clone());
    let stored = api.get(DEFAULT_OWNER_NAME).await.expect("owner exists");
    assert_eq!(stored.shipwright_build_state(), "Enabled");
    assert_eq!(stored.shared_resource_state(), "Enabled");
    assert!(stored.spec.shared_resource.is_some());
    assert!(stored.has_finalizer(OWNER_FINALIZER));

    // Operator restart
    let outcome = bootstrap(&owners, &RetryConfig::with_max_attempts(3))
        .await
        .expect("second bootstrap should succeed");
    assert_eq!(outcome, BootstrapOutcome::Unchanged);

    cleanup_owner(&client, DEFAULT_OWNER_NAME).await;
}

/// Story: an administrator created the owner before the operator started
///
/// Expected behavior:
/// - The administrator's Disabled choice is kept
/// - The missing build subsystem block is filled with Enabled
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_bootstrap_completes_user_created_owner() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    cleanup_owner(&client, DEFAULT_OWNER_NAME).await;

    let api: Api<OpenShiftBuild> = Api::all(client.clone());
    let user_owner = OpenShiftBuild::new(
        DEFAULT_OWNER_NAME,
        OpenShiftBuildSpec {
            shipwright: None,
            shared_resource: Some(SharedResourceConfig {
                state: "Disabled".to_string(),
            }),
        },
    );
    api.create(&PostParams::default(), &user_owner)
        .await
        .expect("create should succeed");

    let owners = OwnerClientImpl::new(client.clone());
    let outcome = bootstrap(&owners, &RetryConfig::with_max_attempts(3))
        .await
        .expect("bootstrap should succeed");
    assert_eq!(outcome, BootstrapOutcome::Updated);

    let stored = api.get(DEFAULT_OWNER_NAME).await.expect("owner exists");
    assert_eq!(stored.name_any(), DEFAULT_OWNER_NAME);
    assert_eq!(stored.shared_resource_state(), "Disabled");
    assert!(stored
        .spec
        .shipwright
        .as_ref()
        .and_then(|s| s.build.as_ref())
        .is_some());
    assert!(stored.has_finalizer(OWNER_FINALIZER));

    cleanup_owner(&client, DEFAULT_OWNER_NAME).await;
}
