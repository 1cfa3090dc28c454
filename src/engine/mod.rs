//! Convergence engine: applies, strips and deletes resources in order
//!
//! Resources are processed one at a time in the order given. The first
//! failure stops the run; whatever was already written stays written and the
//! next reconcile picks up from the store's actual state. Every store call is
//! raced against the caller's cancellation token and a per-call timeout.

#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kube::api::DynamicObject;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use openshift_builds_common::kube_utils::{ObjectKey, ObjectStore};
use openshift_builds_common::{Error, Result};

/// Default per-call timeout for store operations
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of an apply run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Resources that did not exist and were created
    pub created: usize,
    /// Resources that existed and were replaced
    pub updated: usize,
    /// Resources that already matched
    pub unchanged: usize,
}

/// Outcome of a finalizer strip run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StripReport {
    /// Resources whose finalizers were cleared
    pub stripped: usize,
    /// Resources that had no finalizers
    pub clean: usize,
    /// Resources that do not exist
    pub missing: usize,
}

/// Sequential create/update/strip/delete against an [`ObjectStore`]
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn ObjectStore>,
    call_timeout: Duration,
}

impl Engine {
    /// Engine using the default per-call timeout
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_timeout(store, DEFAULT_CALL_TIMEOUT)
    }

    /// Engine with an explicit per-call timeout
    pub fn with_timeout(store: Arc<dyn ObjectStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Create absent resources and update drifted ones.
    ///
    /// A live object counts as drifted only when something the template
    /// sets differs; fields the server or other controllers added are left
    /// alone. Labels, annotations, finalizers and owner references from the
    /// template are merged into the live lists, never replacing them, and
    /// every top-level body field the template declares is written whole.
    pub async fn apply(
        &self,
        resources: &[DynamicObject],
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for desired in resources {
            let key = ObjectKey::of(desired)?;
            let resource = key.to_string();

            let live = self
                .guarded("get", cancel, self.store.get(&key))
                .await
                .map_err(|e| wrap(e, |m| Error::get(&resource, m)))?;

            match live {
                None => {
                    self.guarded("create", cancel, self.store.create(desired))
                        .await
                        .map_err(|e| wrap(e, |m| Error::apply(&resource, m)))?;
                    debug!(resource = %resource, "created");
                    report.created += 1;
                }
                Some(live) => match merge_tracked(&live, desired) {
                    None => {
                        trace!(resource = %resource, "unchanged");
                        report.unchanged += 1;
                    }
                    Some(merged) => {
                        self.guarded("update", cancel, self.store.update(&merged))
                            .await
                            .map_err(|e| wrap(e, |m| Error::apply(&resource, m)))?;
                        debug!(resource = %resource, "updated");
                        report.updated += 1;
                    }
                },
            }
        }

        Ok(report)
    }

    /// Remove `finalizer` from every resource that still exists.
    ///
    /// Finalizers owned by other controllers stay in place. Missing
    /// resources count as done, so the run is safe to repeat.
    pub async fn strip_finalizers(
        &self,
        resources: &[DynamicObject],
        finalizer: &str,
        cancel: &CancellationToken,
    ) -> Result<StripReport> {
        let mut report = StripReport::default();

        for template in resources {
            let key = ObjectKey::of(template)?;
            let resource = key.to_string();

            let live = self
                .guarded("get", cancel, self.store.get(&key))
                .await
                .map_err(|e| wrap(e, |m| Error::get(&resource, m)))?;

            let Some(mut live) = live else {
                trace!(resource = %resource, "already gone");
                report.missing += 1;
                continue;
            };

            let held = live
                .metadata
                .finalizers
                .as_ref()
                .is_some_and(|f| f.iter().any(|t| t == finalizer));
            if !held {
                report.clean += 1;
                continue;
            }

            if let Some(finalizers) = live.metadata.finalizers.as_mut() {
                finalizers.retain(|t| t != finalizer);
            }
            self.guarded("update", cancel, self.store.update(&live))
                .await
                .map_err(|e| wrap(e, |m| Error::update(&resource, m)))?;
            debug!(resource = %resource, finalizer, "finalizer stripped");
            report.stripped += 1;
        }

        Ok(report)
    }

    /// Delete every resource; absent resources are not an error
    pub async fn delete(
        &self,
        resources: &[DynamicObject],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut deleted = 0;
        for template in resources {
            let key = ObjectKey::of(template)?;
            let resource = key.to_string();

            self.guarded("delete", cancel, self.store.delete(&key))
                .await
                .map_err(|e| wrap(e, |m| Error::delete(&resource, m)))?;
            debug!(resource = %resource, "deleted");
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn guarded<T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        guarded(operation, self.call_timeout, cancel, call).await
    }
}

/// Race a store call against `cancel` and `timeout`.
///
/// A token that is already cancelled fails before the call is polled.
pub(crate) async fn guarded<T>(
    operation: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled(operation));
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled(operation)),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation, timeout)),
        },
    }
}

/// Attach the resource identity to a store failure.
///
/// Cancellation and timeout keep their own variants so callers can tell
/// them apart from a store rejection. Anything else is kept as the cause.
fn wrap(err: Error, with_resource: impl FnOnce(String) -> Error) -> Error {
    match err {
        Error::Cancelled { .. } | Error::Timeout { .. } => err,
        other => with_resource(other.to_string()).caused_by(other),
    }
}

/// The live object with the template merged in, or `None` if the live
/// object already holds everything the template sets.
fn merge_tracked(live: &DynamicObject, desired: &DynamicObject) -> Option<DynamicObject> {
    let mut merged = live.clone();
    let want = &desired.metadata;
    let meta = &mut merged.metadata;

    let mut drifted = merge_map(&mut meta.labels, &want.labels);
    drifted |= merge_map(&mut meta.annotations, &want.annotations);
    drifted |= merge_list(&mut meta.finalizers, &want.finalizers, |a, b| a == b);
    drifted |= merge_list(&mut meta.owner_references, &want.owner_references, |a, b| {
        a.uid == b.uid
    });

    match (&mut merged.data, &desired.data) {
        (Value::Object(out), Value::Object(fields)) => {
            for (field, value) in fields {
                let current = out.get(field).unwrap_or(&Value::Null);
                if !contains(current, value) {
                    out.insert(field.clone(), value.clone());
                    drifted = true;
                }
            }
        }
        (_, Value::Null) => {}
        (out, wanted) => {
            if !contains(out, wanted) {
                *out = wanted.clone();
                drifted = true;
            }
        }
    }

    drifted.then_some(merged)
}

/// Set every wanted entry; entries only the live map has are kept
fn merge_map(
    live: &mut Option<BTreeMap<String, String>>,
    want: &Option<BTreeMap<String, String>>,
) -> bool {
    let Some(want) = want.as_ref().filter(|w| !w.is_empty()) else {
        return false;
    };
    let out = live.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in want {
        if out.get(key) != Some(value) {
            out.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Add or refresh every wanted item, matched with `same`; live-only items stay
fn merge_list<T: Clone + PartialEq>(
    live: &mut Option<Vec<T>>,
    want: &Option<Vec<T>>,
    same: impl Fn(&T, &T) -> bool,
) -> bool {
    let Some(want) = want.as_ref().filter(|w| !w.is_empty()) else {
        return false;
    };
    let out = live.get_or_insert_with(Vec::new);
    let mut changed = false;
    for item in want {
        match out.iter_mut().find(|existing| same(existing, item)) {
            Some(existing) if existing == item => {}
            Some(existing) => {
                *existing = item.clone();
                changed = true;
            }
            None => {
                out.push(item.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Whether `live` holds everything `want` sets.
///
/// Maps match when every wanted key matches; keys only the live side has
/// (server defaults) are ignored. Lists match element-wise and must have
/// the same length. The API server drops empty values, so a wanted null,
/// empty map or empty list also matches an absent one.
fn contains(live: &Value, want: &Value) -> bool {
    match (live, want) {
        (Value::Object(have), Value::Object(fields)) => fields.iter().all(|(key, w)| {
            have.get(key)
                .map_or_else(|| is_empty_value(w), |h| contains(h, w))
        }),
        (Value::Array(have), Value::Array(items)) => {
            have.len() == items.len() && have.iter().zip(items).all(|(h, w)| contains(h, w))
        }
        (Value::Null, w) => is_empty_value(w),
        (h, w) => h == w,
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
