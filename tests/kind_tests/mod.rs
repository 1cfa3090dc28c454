//! Integration tests for the OpenShift Builds operator
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of how
//! an OpenShiftBuild drives its dependents on a real API server.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating and defaulting OpenShiftBuild
//!   resources through the Kubernetes API
//!
//! - `owner_lifecycle`: Stories about how a reconcile installs, releases and
//!   cleans up shared resources as the owner changes
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod helpers;
mod owner_lifecycle;
