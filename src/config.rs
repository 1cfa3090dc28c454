//! Operator configuration from flags and environment

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use openshift_builds_common::{
    DEFAULT_SHARED_RESOURCE_MANIFEST_PATH, OPENSHIFT_BUILDS_NAMESPACE,
    SHARED_RESOURCE_IMAGE_PREFIX,
};

/// OpenShift Builds operator - installs Shipwright builds and shared resources
#[derive(Parser, Debug, Clone)]
#[command(name = "openshift-builds-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the OpenShiftBuild CRD and exit
    #[arg(long)]
    pub crd: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// File or directory holding the shared resource manifests
    #[arg(
        long,
        env = "SHARED_RESOURCE_MANIFEST_PATH",
        default_value = DEFAULT_SHARED_RESOURCE_MANIFEST_PATH
    )]
    pub shared_resource_manifest_path: PathBuf,

    /// Also read manifests from subdirectories
    #[arg(long, env = "SHARED_RESOURCE_MANIFEST_RECURSIVE")]
    pub recursive: bool,

    /// Namespace the build subsystem and shared resources are installed into
    #[arg(long, env = "OPENSHIFT_BUILDS_NAMESPACE", default_value = OPENSHIFT_BUILDS_NAMESPACE)]
    pub target_namespace: String,

    /// Prefix of environment variables carrying container image substitutions
    #[arg(long, env = "IMAGE_ENV_PREFIX", default_value = SHARED_RESOURCE_IMAGE_PREFIX)]
    pub image_env_prefix: String,

    /// Delete shared resources when they are Disabled instead of only
    /// releasing their finalizers
    #[arg(long, env = "SHARED_RESOURCE_DELETE_ON_DISABLE")]
    pub delete_disabled_shared_resources: bool,

    /// Timeout for every individual API call made while converging
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value = "30")]
    pub store_timeout_secs: u64,

    /// Do not create the default OpenShiftBuild on startup
    #[arg(long)]
    pub skip_bootstrap: bool,
}

/// Settings the controller runs with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Where the shared resource manifests are loaded from
    pub manifest_path: PathBuf,
    /// Whether manifest directories are walked recursively
    pub recursive: bool,
    /// Target namespace for installed resources
    pub namespace: String,
    /// Prefix selecting image substitution variables
    pub image_prefix: String,
    /// Delete (not just release) Disabled shared resources
    pub delete_disabled_shared_resources: bool,
    /// Per-call timeout for store operations
    pub store_timeout: Duration,
    /// Skip the startup bootstrap of the default owner
    pub skip_bootstrap: bool,
}

impl From<&Cli> for OperatorConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            manifest_path: cli.shared_resource_manifest_path.clone(),
            recursive: cli.recursive,
            namespace: cli.target_namespace.clone(),
            image_prefix: cli.image_env_prefix.clone(),
            delete_disabled_shared_resources: cli.delete_disabled_shared_resources,
            store_timeout: Duration::from_secs(cli.store_timeout_secs),
            skip_bootstrap: cli.skip_bootstrap,
        }
    }
}
