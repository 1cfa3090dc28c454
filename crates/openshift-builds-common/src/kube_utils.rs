//! Resource identity and store access for arbitrary Kubernetes objects
//!
//! Templates are loaded as [`DynamicObject`]s: typed metadata plus an open
//! JSON body. [`ObjectStore`] is the seam between the apply engine and the
//! cluster; [`KubeStore`] implements it against the API server and resolves
//! each kind's scope through discovery.

use std::fmt;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, GroupVersionKind, PostParams};
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::{Error, Result, FIELD_MANAGER};

/// Split an apiVersion into (group, version).
///
/// ```
/// use openshift_builds_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("apps/v1"), ("apps".to_string(), "v1".to_string()));
/// assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Identity of a resource: apiVersion, kind, optional namespace, name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// apiVersion (e.g. `apps/v1`)
    pub api_version: String,
    /// Kind (e.g. `DaemonSet`)
    pub kind: String,
    /// Namespace, absent for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Build a key from its parts
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace,
            name: name.into(),
        }
    }

    /// Extract the identity of an object.
    ///
    /// Fails if apiVersion, kind or metadata.name is missing.
    pub fn of(obj: &DynamicObject) -> Result<Self> {
        let types = obj
            .types
            .as_ref()
            .ok_or_else(|| Error::serialization("object has no apiVersion/kind"))?;
        if types.api_version.is_empty() {
            return Err(Error::serialization_for_kind(&types.kind, "missing apiVersion"));
        }
        if types.kind.is_empty() {
            return Err(Error::serialization("missing kind"));
        }
        let name = obj
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::serialization_for_kind(&types.kind, "missing metadata.name"))?;

        Ok(Self {
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
            namespace: obj.metadata.namespace.clone().filter(|n| !n.is_empty()),
            name,
        })
    }

    /// Group/version/kind for discovery lookups
    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version) = parse_api_version(&self.api_version);
        GroupVersionKind::gvk(&group, &version, &self.kind)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Convert a parsed manifest document into a [`DynamicObject`].
///
/// The document must carry apiVersion, kind and metadata.name.
pub fn dynamic_object_from_value(value: Value) -> Result<DynamicObject> {
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .map(str::to_string);
    let obj: DynamicObject = serde_json::from_value(value).map_err(|e| match &kind {
        Some(k) => Error::serialization_for_kind(k, e.to_string()),
        None => Error::serialization(e.to_string()),
    })?;
    ObjectKey::of(&obj)?;
    Ok(obj)
}

/// Read/write access to cluster objects of any kind.
///
/// Implementations must be safe to share between tasks. Every call is a
/// single round trip; callers own retry and cancellation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` if it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    /// Create an object that does not exist yet
    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject>;

    /// Replace an existing object (carries the live resourceVersion)
    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject>;

    /// Delete an object; deleting a missing object succeeds
    async fn delete(&self, key: &ObjectKey) -> Result<()>;
}

/// [`ObjectStore`] backed by the Kubernetes API server
pub struct KubeStore {
    client: Client,
    discovery: RwLock<Discovery>,
}

impl KubeStore {
    /// Create a store and run the initial API discovery
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self {
            client,
            discovery: RwLock::new(discovery),
        })
    }

    async fn resolve(&self, key: &ObjectKey) -> Result<(ApiResource, ApiCapabilities)> {
        let gvk = key.gvk();
        if let Some(found) = self.discovery.read().await.resolve_gvk(&gvk) {
            return Ok(found);
        }

        // Kind may belong to a CRD installed after startup
        debug!(kind = %key.kind, api_version = %key.api_version, "refreshing API discovery");
        let refreshed = Discovery::new(self.client.clone()).run().await?;
        let found = refreshed.resolve_gvk(&gvk);
        *self.discovery.write().await = refreshed;

        found.ok_or_else(|| {
            Error::internal_with_context(
                "kube-store",
                format!("unknown resource type: {}/{}", key.api_version, key.kind),
            )
        })
    }

    /// Api handle for the key plus whether the kind is namespaced
    async fn api_for(&self, key: &ObjectKey) -> Result<(Api<DynamicObject>, bool)> {
        let (resource, caps) = self.resolve(key).await?;
        let api = match (&caps.scope, &key.namespace) {
            (Scope::Cluster, _) => return Ok((Api::all_with(self.client.clone(), &resource), false)),
            (Scope::Namespaced, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            (Scope::Namespaced, None) => Api::default_namespaced_with(self.client.clone(), &resource),
        };
        Ok((api, true))
    }

    async fn prepare(&self, obj: &DynamicObject) -> Result<(Api<DynamicObject>, ObjectKey, DynamicObject)> {
        let key = ObjectKey::of(obj)?;
        let (api, namespaced) = self.api_for(&key).await?;
        let mut body = obj.clone();
        if !namespaced {
            body.metadata.namespace = None;
        }
        Ok((api, key, body))
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let (api, _) = self.api_for(key).await?;
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject> {
        let (api, key, body) = self.prepare(obj).await?;
        trace!(resource = %key, "creating");
        Ok(api.create(&post_params(), &body).await?)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject> {
        let (api, key, body) = self.prepare(obj).await?;
        trace!(resource = %key, "replacing");
        Ok(api.replace(&key.name, &post_params(), &body).await?)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let (api, _) = self.api_for(key).await?;
        match api.delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
