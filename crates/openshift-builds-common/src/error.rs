//! Error types for the OpenShift Builds operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Store failures carry the identity of the resource being processed so
//! that the message written to the owner's `Ready` condition points at the
//! object that blocked convergence.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Template source is unreadable or a document failed to parse
    #[error("failed to load manifests from {path}: {message}")]
    Load {
        /// File or directory being loaded
        path: String,
        /// Description of what failed
        message: String,
    },

    /// A transformer rejected a resource
    #[error("transformer {transformer} rejected {resource}: {message}")]
    Transform {
        /// Name of the transformer (e.g. "InjectContainerImages")
        transformer: String,
        /// Identity of the rejected resource (kind/namespace/name)
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// Creating or updating a resource during apply failed
    #[error("failed to apply {resource}: {message}")]
    Apply {
        /// Identity of the resource
        resource: String,
        /// Description of what failed
        message: String,
        /// Store error that caused the failure, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// Reading a resource from the store failed
    #[error("failed to get {resource}: {message}")]
    Get {
        /// Identity of the resource
        resource: String,
        /// Description of what failed
        message: String,
        /// Store error that caused the failure, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// Writing back a resource (outside of apply) failed
    #[error("failed to update {resource}: {message}")]
    Update {
        /// Identity of the resource
        resource: String,
        /// Description of what failed
        message: String,
        /// Store error that caused the failure, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// Deleting a resource failed
    #[error("failed to delete {resource}: {message}")]
    Delete {
        /// Identity of the resource
        resource: String,
        /// Description of what failed
        message: String,
        /// Store error that caused the failure, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// The owner declares a lifecycle state the operator does not know
    #[error("unknown component state {value:?} for {component}")]
    InvalidState {
        /// Sub-component whose state is invalid (e.g. "SharedResource")
        component: String,
        /// The declared value, verbatim
        value: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// The operation was cancelled before the store answered
    #[error("operation {operation} cancelled")]
    Cancelled {
        /// The store operation that was in flight
        operation: String,
    },

    /// The store did not answer within the per-call timeout
    #[error("operation {operation} timed out after {after:?}")]
    Timeout {
        /// The store operation that was in flight
        operation: String,
        /// The timeout that elapsed
        after: Duration,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "store")
        context: String,
    },
}

impl Error {
    /// Create a load error for the given path
    pub fn load(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a transform error
    pub fn transform(
        transformer: impl Into<String>,
        resource: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Transform {
            transformer: transformer.into(),
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an apply error for a resource
    pub fn apply(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Apply {
            resource: resource.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Create a get error for a resource
    pub fn get(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Get {
            resource: resource.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Create an update error for a resource
    pub fn update(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Update {
            resource: resource.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Create a delete error for a resource
    pub fn delete(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Delete {
            resource: resource.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Record `cause` as the source of a store error.
    ///
    /// Retry classification then follows the cause, so a rejected request
    /// (403, 422) is not retried while a dropped connection is. Other
    /// variants are returned unchanged.
    pub fn caused_by(mut self, cause: Error) -> Self {
        if let Error::Apply { source, .. }
        | Error::Get { source, .. }
        | Error::Update { source, .. }
        | Error::Delete { source, .. } = &mut self
        {
            *source = Some(Box::new(cause));
        }
        self
    }

    /// Create an invalid state error for a sub-component
    pub fn invalid_state(component: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidState {
            component: component.into(),
            value: value.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a cancellation error for an operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error for an operation
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Invalid states, unloadable templates and serialization errors require
    /// an operator to fix configuration; retrying reproduces the same error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae)
                    if (400..500).contains(&ae.code) && ae.code != 409 && ae.code != 429
            ),
            Error::InvalidState { .. } => false,
            Error::Load { .. } => false,
            Error::Serialization { .. } => false,
            Error::Transform { .. } => true,
            Error::Apply { source, .. }
            | Error::Get { source, .. }
            | Error::Update { source, .. }
            | Error::Delete { source, .. } => {
                source.as_deref().map_or(true, Error::is_retryable)
            }
            Error::Cancelled { .. } | Error::Timeout { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// Get the resource identity if this error is about a specific resource
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::Transform { resource, .. }
            | Error::Apply { resource, .. }
            | Error::Get { resource, .. }
            | Error::Update { resource, .. }
            | Error::Delete { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Check if this error wraps a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }
}
