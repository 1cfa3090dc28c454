use kube::api::DynamicObject;
use serde_json::Value;

use openshift_builds_common::Result;

use super::Transform;

/// Moves the resource into the target namespace.
///
/// `metadata.namespace` is overwritten unconditionally; the store drops it
/// again for cluster-scoped kinds. References that must follow the
/// namespace are rewritten too: ServiceAccount subjects of role bindings and
/// the service of admission and conversion webhooks.
#[derive(Clone, Debug)]
pub struct InjectNamespace {
    namespace: String,
}

impl InjectNamespace {
    /// Target `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn set(&self, slot: Option<&mut Value>) {
        if let Some(Value::Object(map)) = slot {
            map.insert("namespace".to_string(), Value::String(self.namespace.clone()));
        }
    }
}

impl Transform for InjectNamespace {
    fn name(&self) -> &'static str {
        "InjectNamespace"
    }

    fn transform(&self, obj: &mut DynamicObject) -> Result<()> {
        obj.metadata.namespace = Some(self.namespace.clone());

        let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default();
        match kind {
            "RoleBinding" | "ClusterRoleBinding" => {
                if let Some(Value::Array(subjects)) = obj.data.get_mut("subjects") {
                    for subject in subjects {
                        if subject.get("kind").and_then(Value::as_str) == Some("ServiceAccount") {
                            self.set(Some(subject));
                        }
                    }
                }
            }
            "ValidatingWebhookConfiguration" | "MutatingWebhookConfiguration" => {
                if let Some(Value::Array(webhooks)) = obj.data.get_mut("webhooks") {
                    for webhook in webhooks {
                        self.set(webhook.pointer_mut("/clientConfig/service"));
                    }
                }
            }
            "CustomResourceDefinition" => {
                self.set(obj.data.pointer_mut("/spec/conversion/webhook/clientConfig/service"));
            }
            _ => {}
        }
        Ok(())
    }
}
