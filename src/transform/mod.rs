//! Transformer pipeline: rewrites templates into concrete resources
//!
//! Each [`Transform`] edits one resource in place. A [`Pipeline`] deep-copies
//! every template, runs its transformers left to right, and aborts on the
//! first rejection so that a partially transformed set is never applied.

mod finalizer;
mod images;
mod namespace;
mod owner;

use kube::api::DynamicObject;

use openshift_builds_common::kube_utils::ObjectKey;
use openshift_builds_common::{Error, Result};

pub use finalizer::InjectFinalizer;
pub use images::{
    EnvSource, ImageMapping, InjectContainerImages, OsEnvSource, PodSpecExtractor, WorkloadKinds,
};
#[cfg(test)]
pub(crate) use images::MockEnvSource;
pub use namespace::InjectNamespace;
pub use owner::InjectOwner;

/// A single rewrite step applied to every resource of a template set
pub trait Transform: Send + Sync {
    /// Name used in errors and logs
    fn name(&self) -> &'static str;

    /// Rewrite `obj` in place or reject it
    fn transform(&self, obj: &mut DynamicObject) -> Result<()>;
}

/// Ordered list of transformers
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Empty pipeline (templates pass through as copies)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformer
    pub fn with(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Names of the transformers, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Transform copies of `templates`; the templates are never modified
    pub fn run(&self, templates: &[DynamicObject]) -> Result<Vec<DynamicObject>> {
        templates
            .iter()
            .map(|template| {
                let mut obj = template.clone();
                for step in &self.steps {
                    step.transform(&mut obj)?;
                }
                Ok(obj)
            })
            .collect()
    }
}

/// Identity string used when reporting a rejected resource
pub(crate) fn describe(obj: &DynamicObject) -> String {
    ObjectKey::of(obj)
        .map(|k| k.to_string())
        .unwrap_or_else(|_| obj.metadata.name.clone().unwrap_or_default())
}

pub(crate) fn reject(step: &dyn Transform, obj: &DynamicObject, message: impl Into<String>) -> Error {
    Error::transform(step.name(), describe(obj), message)
}
