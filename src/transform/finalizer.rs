use kube::api::DynamicObject;

use openshift_builds_common::Result;

use super::Transform;

/// Appends a finalizer token unless the resource already carries it
#[derive(Clone, Debug)]
pub struct InjectFinalizer {
    token: String,
}

impl InjectFinalizer {
    /// Inject `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Transform for InjectFinalizer {
    fn name(&self) -> &'static str {
        "InjectFinalizer"
    }

    fn transform(&self, obj: &mut DynamicObject) -> Result<()> {
        let finalizers = obj.metadata.finalizers.get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|f| f == &self.token) {
            finalizers.push(self.token.clone());
        }
        Ok(())
    }
}
