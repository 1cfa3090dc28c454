//! Common types for the OpenShift Builds operator: CRDs, errors, and store access

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the shared resources and the build subsystem are installed into
pub const OPENSHIFT_BUILDS_NAMESPACE: &str = "openshift-builds";

/// Name of the singleton OpenShiftBuild created at startup
pub const DEFAULT_OWNER_NAME: &str = "cluster";

/// Finalizer carried by the owner and by every shared resource it installs
pub const OWNER_FINALIZER: &str = "openshiftbuilds-finalizer";

/// Field manager recorded on every write made by the operator
pub const FIELD_MANAGER: &str = "openshift-builds-operator";

/// Environment variable overriding the shared resource manifest path
pub const SHARED_RESOURCE_MANIFEST_PATH_ENV: &str = "SHARED_RESOURCE_MANIFEST_PATH";

/// Default location of the shared resource manifests, relative to the working directory
pub const DEFAULT_SHARED_RESOURCE_MANIFEST_PATH: &str = "config/sharedresource";

/// Prefix of environment variables that carry container image substitutions
pub const SHARED_RESOURCE_IMAGE_PREFIX: &str = "IMAGE_SHARED_";
