//! Startup bootstrap of the default OpenShiftBuild
//!
//! The operator always manages one owner named `cluster`. On startup it is
//! created if absent, or completed if a user created it with missing blocks,
//! so that the declared state is explicit and the owner finalizer is present
//! before the controller starts.

use kube::ResourceExt;
use tracing::{debug, info};

use openshift_builds_common::crd::{OpenShiftBuild, OpenShiftBuildSpec};
use openshift_builds_common::retry::{retry_with_backoff, RetryConfig};
use openshift_builds_common::{Error, DEFAULT_OWNER_NAME, OWNER_FINALIZER};

use crate::controller::OwnerClient;

/// What the bootstrap did to the default owner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The owner did not exist and was created
    Created,
    /// The owner existed and was completed
    Updated,
    /// The owner already had defaults and the finalizer
    Unchanged,
}

/// Complete `owner` in place; returns true if anything changed
fn complete(owner: &mut OpenShiftBuild) -> bool {
    let mut changed = owner.apply_defaults();
    if !owner.has_finalizer(OWNER_FINALIZER) {
        owner.finalizers_mut().push(OWNER_FINALIZER.to_string());
        changed = true;
    }
    changed
}

/// The default owner as created on a fresh cluster
pub fn default_owner() -> OpenShiftBuild {
    let mut owner = OpenShiftBuild::new(DEFAULT_OWNER_NAME, OpenShiftBuildSpec::default());
    complete(&mut owner);
    owner
}

/// Create or complete the default owner once
pub async fn ensure_default_owner(owners: &dyn OwnerClient) -> Result<BootstrapOutcome, Error> {
    match owners.get(DEFAULT_OWNER_NAME).await? {
        None => {
            owners.create(&default_owner()).await?;
            info!(owner = DEFAULT_OWNER_NAME, "created default OpenShiftBuild");
            Ok(BootstrapOutcome::Created)
        }
        Some(mut owner) => {
            if owner.is_deleting() {
                debug!(owner = %owner.name_any(), "default OpenShiftBuild is being deleted, leaving it alone");
                return Ok(BootstrapOutcome::Unchanged);
            }
            if !complete(&mut owner) {
                debug!(owner = %owner.name_any(), "default OpenShiftBuild already complete");
                return Ok(BootstrapOutcome::Unchanged);
            }
            owners.replace(&owner).await?;
            info!(owner = %owner.name_any(), "completed default OpenShiftBuild");
            Ok(BootstrapOutcome::Updated)
        }
    }
}

/// [`ensure_default_owner`] retried with backoff until it succeeds or a
/// non-retryable error occurs
pub async fn bootstrap(
    owners: &dyn OwnerClient,
    retry: &RetryConfig,
) -> Result<BootstrapOutcome, Error> {
    retry_with_backoff(retry, "bootstrap default OpenShiftBuild", || {
        ensure_default_owner(owners)
    })
    .await
}
