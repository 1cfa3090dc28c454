//! In-memory object store for tests
//!
//! Mimics the parts of API server behaviour the engine relies on:
//! resourceVersion bumps, 409 on create of an existing name, finalizers
//! holding a deleted object until they are cleared.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;

use openshift_builds_common::kube_utils::{ObjectKey, ObjectStore};
use openshift_builds_common::{Error, Result};

pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::from(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} (injected)"),
        reason: reason.to_string(),
        code,
    }))
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<HashMap<ObjectKey, DynamicObject>>,
    failures: Mutex<Vec<(&'static str, String, u16, &'static str)>>,
    hang: Mutex<Option<&'static str>>,
    writes: Mutex<Vec<String>>,
    version: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `obj` as if it had been created by someone else
    pub fn seed(&self, obj: DynamicObject) {
        let key = ObjectKey::of(&obj).unwrap();
        let mut obj = obj;
        obj.metadata.resource_version = Some(self.next_version());
        self.objects.lock().unwrap().insert(key, obj);
    }

    /// Make `op` ("get", "create", "update", "delete") fail for objects named `name`
    pub fn fail_on(&self, op: &'static str, name: &str) {
        self.fail_with(op, name, 500, "InternalError");
    }

    /// Like [`fail_on`](Self::fail_on) but answering with `code` and `reason`
    pub fn fail_with(&self, op: &'static str, name: &str, code: u16, reason: &'static str) {
        self.failures
            .lock()
            .unwrap()
            .push((op, name.to_string(), code, reason));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Make every `op` call wait forever
    pub fn hang_on(&self, op: &'static str) {
        *self.hang.lock().unwrap() = Some(op);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Look up by kind and name, ignoring namespace
    pub fn find(&self, kind: &str, name: &str) -> Option<DynamicObject> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k.kind == kind && k.name == name)
            .map(|(_, v)| v.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Mutating calls in the order they happened, as "op Kind/ns/name"
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Objects carrying `finalizer`
    pub fn holding(&self, finalizer: &str) -> Vec<ObjectKey> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, o)| {
                o.metadata
                    .finalizers
                    .as_ref()
                    .is_some_and(|f| f.iter().any(|t| t == finalizer))
            })
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    async fn enter(&self, op: &'static str, key: &ObjectKey) -> Result<()> {
        let hang = *self.hang.lock().unwrap() == Some(op);
        if hang {
            std::future::pending::<()>().await;
        }
        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(o, n, _, _)| *o == op && *n == key.name)
            .map(|(_, _, code, reason)| (*code, *reason));
        if let Some((code, reason)) = failing {
            return Err(api_error(code, reason));
        }
        if op != "get" {
            self.writes.lock().unwrap().push(format!("{op} {key}"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        self.enter("get", key).await?;
        Ok(self.object(key))
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(obj)?;
        self.enter("create", &key).await?;

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(self.next_version());
        stored.metadata.uid = Some(format!("uid-{}", key.name));
        objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(obj)?;
        self.enter("update", &key).await?;

        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get(&key) else {
            return Err(api_error(404, "NotFound"));
        };
        if obj.metadata.resource_version.is_some()
            && obj.metadata.resource_version != current.metadata.resource_version
        {
            return Err(api_error(409, "Conflict"));
        }

        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(self.next_version());
        stored.metadata.deletion_timestamp = current.metadata.deletion_timestamp.clone();

        let released = stored.metadata.deletion_timestamp.is_some()
            && stored.metadata.finalizers.as_ref().map_or(true, Vec::is_empty);
        if released {
            objects.remove(&key);
        } else {
            objects.insert(key, stored.clone());
        }
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.enter("delete", key).await?;

        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get_mut(key) else {
            return Ok(());
        };
        if current.metadata.finalizers.as_ref().map_or(true, Vec::is_empty) {
            objects.remove(key);
        } else {
            current.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
        }
        Ok(())
    }
}
