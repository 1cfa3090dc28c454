//! OpenShiftBuild CRD: the owner of everything the operator installs
//!
//! A single cluster-scoped instance (named `cluster`) declares which
//! sub-components are enabled. The operator reports readiness through the
//! `Ready` condition in its status.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ComponentState, Condition};

/// Condition type reported on the owner
pub const CONDITION_READY: &str = "Ready";

/// OpenShiftBuild declares the desired state of OpenShift Builds on a cluster.
///
/// Example:
/// ```yaml
/// apiVersion: operator.openshift.io/v1alpha1
/// kind: OpenShiftBuild
/// metadata:
///   name: cluster
/// spec:
///   shipwright:
///     build:
///       state: Enabled
///   sharedResource:
///     state: Disabled
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.openshift.io",
    version = "v1alpha1",
    kind = "OpenShiftBuild",
    plural = "openshiftbuilds",
    status = "OpenShiftBuildStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftBuildSpec {
    /// Shipwright build subsystem settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipwright: Option<ShipwrightConfig>,

    /// Shared Resource CSI driver settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_resource: Option<SharedResourceConfig>,
}

/// Shipwright settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShipwrightConfig {
    /// Shipwright Build controller settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ComponentConfig>,
}

/// Shared Resource settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedResourceConfig {
    /// Declared state: `Enabled` or `Disabled`
    pub state: String,
}

/// Settings shared by every toggleable sub-component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    /// Declared state: `Enabled` or `Disabled`
    pub state: String,
}

/// Observed state of an OpenShiftBuild
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftBuildStatus {
    /// Reconciliation outcome, one entry per condition type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl OpenShiftBuild {
    /// Declared state of the Shipwright build subsystem (absent means Enabled)
    pub fn shipwright_build_state(&self) -> &str {
        self.spec
            .shipwright
            .as_ref()
            .and_then(|s| s.build.as_ref())
            .map(|b| b.state.as_str())
            .unwrap_or(ComponentState::ENABLED)
    }

    /// Declared state of the shared resources (absent means Enabled)
    pub fn shared_resource_state(&self) -> &str {
        self.spec
            .shared_resource
            .as_ref()
            .map(|s| s.state.as_str())
            .unwrap_or(ComponentState::ENABLED)
    }

    /// Whether the owner has been marked for deletion
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the owner carries `finalizer`
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Current conditions (empty when status was never written)
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// Fill absent sub-component blocks with `Enabled`.
    ///
    /// Returns true if the spec changed.
    pub fn apply_defaults(&mut self) -> bool {
        let mut changed = false;

        let shipwright = self.spec.shipwright.get_or_insert_with(Default::default);
        if shipwright.build.is_none() {
            shipwright.build = Some(ComponentConfig {
                state: ComponentState::ENABLED.to_string(),
            });
            changed = true;
        }

        if self.spec.shared_resource.is_none() {
            self.spec.shared_resource = Some(SharedResourceConfig {
                state: ComponentState::ENABLED.to_string(),
            });
            changed = true;
        }

        changed
    }
}
