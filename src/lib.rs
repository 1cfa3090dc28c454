//! OpenShift Builds - Kubernetes operator for the build subsystem and shared resources
//!
//! A single cluster-scoped `OpenShiftBuild` declares, per sub-component,
//! whether it is `Enabled` or `Disabled`. The operator converges the cluster
//! toward that declaration and guards deletion with finalizers so no
//! dependent is orphaned while it still needs cleanup.
//!
//! # Modules
//!
//! - [`manifest`] - Template Store: static resource templates loaded at startup
//! - [`transform`] - Transformer pipeline (owner, finalizer, namespace, images)
//! - [`engine`] - Convergence engine: apply, strip finalizers, delete
//! - [`controller`] - Lifecycle state machine and reconcile entry point
//! - [`components`] - The ShipwrightBuild and shared resource sub-components
//! - [`bootstrap`] - Startup creation of the default OpenShiftBuild
//! - [`config`] - Command line and environment configuration

#![deny(missing_docs)]

pub mod bootstrap;
pub mod components;
pub mod config;
pub mod controller;
pub mod engine;
pub mod manifest;
pub mod transform;

pub use openshift_builds_common as common;
pub use openshift_builds_common::{Error, Result};
