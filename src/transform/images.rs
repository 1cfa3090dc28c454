//! Container image substitution
//!
//! Images are rewritten through an [`ImageMapping`] built from
//! prefix-filtered environment variables. Which kinds carry containers is a
//! registry ([`WorkloadKinds`]) mapping a kind to the location of its pod
//! spec; kinds that are not registered pass through untouched.

use std::collections::{BTreeMap, HashMap};

use kube::api::DynamicObject;
use serde_json::Value;
use tracing::trace;

use openshift_builds_common::Result;

use super::{describe, Transform};

/// Source of process configuration values
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// All variables as (name, value) pairs
    fn vars(&self) -> Vec<(String, String)>;
}

/// Reads the process environment
#[derive(Clone, Debug, Default)]
pub struct OsEnvSource;

impl EnvSource for OsEnvSource {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

/// Exact-match image substitutions, keyed by the current image string
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageMapping {
    entries: BTreeMap<String, String>,
}

impl ImageMapping {
    /// Collect every variable whose name starts with `prefix`.
    ///
    /// The full variable name is the key: a template declares
    /// `image: IMAGE_SHARED_driver` and the value of `IMAGE_SHARED_driver`
    /// replaces it. Variables with an empty value are ignored.
    pub fn from_source(prefix: &str, source: &dyn EnvSource) -> Self {
        let entries = source
            .vars()
            .into_iter()
            .filter(|(name, value)| name.starts_with(prefix) && !value.is_empty())
            .collect();
        Self { entries }
    }

    /// Replacement for `image`, if any
    pub fn get(&self, image: &str) -> Option<&str> {
        self.entries.get(image).map(String::as_str)
    }

    /// Number of substitutions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ImageMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Locates the pod spec inside a workload document
pub type PodSpecExtractor = fn(&mut Value) -> Option<&mut Value>;

fn pod_template_spec(data: &mut Value) -> Option<&mut Value> {
    data.pointer_mut("/spec/template/spec")
}

fn cron_job_spec(data: &mut Value) -> Option<&mut Value> {
    data.pointer_mut("/spec/jobTemplate/spec/template/spec")
}

fn pod_spec(data: &mut Value) -> Option<&mut Value> {
    data.pointer_mut("/spec")
}

/// Registry of kinds that carry containers
#[derive(Clone)]
pub struct WorkloadKinds {
    extractors: HashMap<String, PodSpecExtractor>,
}

impl Default for WorkloadKinds {
    fn default() -> Self {
        let mut kinds = Self::empty();
        for kind in ["Deployment", "DaemonSet", "StatefulSet", "ReplicaSet", "Job"] {
            kinds.register(kind, pod_template_spec);
        }
        kinds.register("CronJob", cron_job_spec);
        kinds.register("Pod", pod_spec);
        kinds
    }
}

impl WorkloadKinds {
    /// Registry without any kind
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register (or replace) the extractor for `kind`
    pub fn register(&mut self, kind: impl Into<String>, extractor: PodSpecExtractor) {
        self.extractors.insert(kind.into(), extractor);
    }

    /// Whether `kind` is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.extractors.contains_key(kind)
    }

    /// Mutable container lists (`containers`, `initContainers`) of `data`
    fn container_lists<'a>(&self, kind: &str, data: &'a mut Value) -> Vec<&'a mut Vec<Value>> {
        let Some(extract) = self.extractors.get(kind) else {
            return Vec::new();
        };
        let Some(Value::Object(spec)) = extract(data) else {
            return Vec::new();
        };
        spec.iter_mut()
            .filter(|(key, _)| *key == "containers" || *key == "initContainers")
            .filter_map(|(_, list)| list.as_array_mut())
            .collect()
    }
}

/// Rewrites container images found in the mapping
#[derive(Clone)]
pub struct InjectContainerImages {
    mapping: ImageMapping,
    kinds: WorkloadKinds,
}

impl InjectContainerImages {
    /// Substitute with `mapping` across the built-in workload kinds
    pub fn new(mapping: ImageMapping) -> Self {
        Self::with_kinds(mapping, WorkloadKinds::default())
    }

    /// Substitute with `mapping` across a custom kind registry
    pub fn with_kinds(mapping: ImageMapping, kinds: WorkloadKinds) -> Self {
        Self { mapping, kinds }
    }
}

impl Transform for InjectContainerImages {
    fn name(&self) -> &'static str {
        "InjectContainerImages"
    }

    fn transform(&self, obj: &mut DynamicObject) -> Result<()> {
        if self.mapping.is_empty() {
            return Ok(());
        }
        let Some(kind) = obj.types.as_ref().map(|t| t.kind.clone()) else {
            return Ok(());
        };
        let resource = describe(obj);

        for list in self.kinds.container_lists(&kind, &mut obj.data) {
            for container in list.iter_mut() {
                let Some(current) = container.get("image").and_then(Value::as_str) else {
                    continue;
                };
                if let Some(replacement) = self.mapping.get(current) {
                    trace!(resource = %resource, from = %current, to = %replacement, "substituting image");
                    container["image"] = Value::String(replacement.to_string());
                }
            }
        }
        Ok(())
    }
}
