//! Reconcile entry point for OpenShiftBuild

use std::sync::Arc;
use std::time::Duration;

use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use openshift_builds_common::crd::{
    find_condition, set_condition, Condition, ConditionStatus, OpenShiftBuild, CONDITION_READY,
};
use openshift_builds_common::kube_utils::ObjectStore;
use openshift_builds_common::{Error, OWNER_FINALIZER, SHARED_RESOURCE_IMAGE_PREFIX};

use super::client::OwnerClient;
use super::lifecycle::{decide, LifecycleAction};
use crate::components::Component;
use crate::engine::{guarded, Engine, DEFAULT_CALL_TIMEOUT};
use crate::transform::{EnvSource, ImageMapping, OsEnvSource};

/// Message of the `Ready` condition before the first pass completes
pub const INITIALIZING_MESSAGE: &str = "Initializing Openshift Builds Operator";

/// Message of the `Ready` condition after a successful pass
pub const SUCCESS_MESSAGE: &str = "Successfully reconciled OpenShiftBuild";

/// How a reconcile pass ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The owner no longer exists; nothing to do
    OwnerNotFound,
    /// Every sub-component matches the declared state
    Converged,
    /// The owner is being deleted and every dependent was released
    Released,
}

/// Controller context shared by every reconcile
pub struct Context {
    /// Access to OpenShiftBuild resources
    pub owners: Arc<dyn OwnerClient>,
    /// Engine writing dependent resources
    pub engine: Engine,
    /// Bound on each owner API call
    pub call_timeout: Duration,
    /// Sub-components, in reconcile order
    pub components: Vec<Arc<dyn Component>>,
    /// Source of image substitution variables
    pub env: Arc<dyn EnvSource>,
    /// Prefix selecting image substitution variables
    pub image_prefix: String,
    /// Cancelled when the operator shuts down
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a builder for a context over the given clients
    pub fn builder(owners: Arc<dyn OwnerClient>, store: Arc<dyn ObjectStore>) -> ContextBuilder {
        ContextBuilder::new(owners, store)
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    owners: Arc<dyn OwnerClient>,
    store: Arc<dyn ObjectStore>,
    components: Vec<Arc<dyn Component>>,
    env: Option<Arc<dyn EnvSource>>,
    image_prefix: String,
    call_timeout: Duration,
    shutdown: Option<CancellationToken>,
}

impl ContextBuilder {
    fn new(owners: Arc<dyn OwnerClient>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            owners,
            store,
            components: Vec::new(),
            env: None,
            image_prefix: SHARED_RESOURCE_IMAGE_PREFIX.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shutdown: None,
        }
    }

    /// Append a sub-component
    pub fn component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Append several sub-components
    pub fn components(mut self, components: impl IntoIterator<Item = Arc<dyn Component>>) -> Self {
        self.components.extend(components);
        self
    }

    /// Override the environment source (primarily for testing)
    pub fn env_source(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = Some(env);
        self
    }

    /// Set the image variable prefix
    pub fn image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    /// Set the per-call store timeout
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Use an existing shutdown token
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            owners: self.owners,
            engine: Engine::with_timeout(self.store, self.call_timeout),
            call_timeout: self.call_timeout,
            components: self.components,
            env: self.env.unwrap_or_else(|| Arc::new(OsEnvSource)),
            image_prefix: self.image_prefix,
            shutdown: self.shutdown.unwrap_or_default(),
        }
    }
}

struct Plan {
    component: &'static str,
    action: LifecycleAction,
    resources: Vec<DynamicObject>,
}

fn ready(status: ConditionStatus, reason: &str, message: impl Into<String>) -> Condition {
    Condition::new(CONDITION_READY, status, reason, message)
}

/// Reconcile the OpenShiftBuild named `name`.
///
/// The owner is read fresh from the API. Every owner call shares the
/// engine's timeout and observes `cancel`. A failure is recorded in the
/// `Ready` condition (best effort) and returned so the caller backs off and
/// retries; the next pass re-derives everything from the cluster.
#[instrument(skip(ctx, cancel), fields(owner = %name))]
pub async fn reconcile_owner(
    name: &str,
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<ReconcileOutcome, Error> {
    let timeout = ctx.call_timeout;
    let fetched = guarded("get", timeout, cancel, ctx.owners.get(name)).await?;
    let Some(owner) = fetched else {
        info!("OpenShiftBuild not found, nothing to reconcile");
        return Ok(ReconcileOutcome::OwnerNotFound);
    };
    debug!(deleting = owner.is_deleting(), "starting reconciliation");

    let mut status = owner.status.clone().unwrap_or_default();
    if find_condition(&status.conditions, CONDITION_READY).is_none() {
        set_condition(
            &mut status.conditions,
            ready(ConditionStatus::Unknown, "Initializing", INITIALIZING_MESSAGE),
        );
        let patched =
            guarded("patch status", timeout, cancel, ctx.owners.patch_status(name, &status));
        if let Err(e) = patched.await {
            error!(error = %e, "failed to initialize status");
            return Err(e);
        }
    }

    match converge(name, &owner, ctx, cancel).await {
        Ok(ReconcileOutcome::Released) => {
            info!("dependents released, owner finalizer removed");
            Ok(ReconcileOutcome::Released)
        }
        Ok(outcome) => {
            let changed = set_condition(
                &mut status.conditions,
                ready(ConditionStatus::True, "Success", SUCCESS_MESSAGE),
            );
            if changed {
                let patched =
                    guarded("patch status", timeout, cancel, ctx.owners.patch_status(name, &status));
                if let Err(e) = patched.await {
                    error!(error = %e, "failed to update status");
                    return Err(e);
                }
            }
            info!("reconciliation finished");
            Ok(outcome)
        }
        Err(err) => {
            error!(error = %err, retryable = err.is_retryable(), "reconciliation failed");
            let changed = set_condition(
                &mut status.conditions,
                ready(
                    ConditionStatus::False,
                    "Failed",
                    format!("Failed to reconcile OpenShiftBuild: {err}"),
                ),
            );
            if changed {
                let patched =
                    guarded("patch status", timeout, cancel, ctx.owners.patch_status(name, &status));
                if let Err(status_err) = patched.await {
                    warn!(error = %status_err, "failed to record failure in status");
                }
            }
            Err(err)
        }
    }
}

async fn converge(
    name: &str,
    owner: &OpenShiftBuild,
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<ReconcileOutcome, Error> {
    let deleting = owner.is_deleting();
    let images = ImageMapping::from_source(&ctx.image_prefix, ctx.env.as_ref());

    // Every decision and transform happens before the first write
    let plans = ctx
        .components
        .iter()
        .map(|component| -> Result<Plan, Error> {
            let declared = component.declared_state(owner);
            let policy = component.disabled_policy();
            let action = decide(component.name(), declared, deleting, policy)?;
            let resources = component.resources(owner, action, &images)?;
            Ok(Plan {
                component: component.name(),
                action,
                resources,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    if !deleting && !owner.has_finalizer(OWNER_FINALIZER) {
        let mut finalizers = owner.finalizers().to_vec();
        finalizers.push(OWNER_FINALIZER.to_string());
        let patch = ctx.owners.patch_finalizers(name, finalizers);
        guarded("patch finalizers", ctx.call_timeout, cancel, patch).await?;
        debug!("owner finalizer added");
    }

    for plan in &plans {
        execute(&ctx.engine, plan, cancel).await?;
    }

    if !deleting {
        return Ok(ReconcileOutcome::Converged);
    }

    if owner.has_finalizer(OWNER_FINALIZER) {
        let remaining = owner
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != OWNER_FINALIZER)
            .cloned()
            .collect();
        let patch = ctx.owners.patch_finalizers(name, remaining);
        guarded("patch finalizers", ctx.call_timeout, cancel, patch).await?;
    }
    Ok(ReconcileOutcome::Released)
}

async fn execute(engine: &Engine, plan: &Plan, cancel: &CancellationToken) -> Result<(), Error> {
    let component = plan.component;
    match plan.action {
        LifecycleAction::Apply => {
            let report = engine.apply(&plan.resources, cancel).await?;
            info!(
                component,
                created = report.created,
                updated = report.updated,
                unchanged = report.unchanged,
                "component applied"
            );
        }
        LifecycleAction::StripFinalizers => {
            let report = engine
                .strip_finalizers(&plan.resources, OWNER_FINALIZER, cancel)
                .await?;
            info!(
                component,
                stripped = report.stripped,
                missing = report.missing,
                "component released"
            );
        }
        LifecycleAction::StripAndDelete => {
            engine
                .strip_finalizers(&plan.resources, OWNER_FINALIZER, cancel)
                .await?;
            let deleted = engine.delete(&plan.resources, cancel).await?;
            info!(component, deleted, "component removed");
        }
    }
    Ok(())
}

/// Reconcile an OpenShiftBuild delivered by the controller runtime
pub async fn reconcile(owner: Arc<OpenShiftBuild>, ctx: Arc<Context>) -> Result<Action, Error> {
    reconcile_owner(&owner.name_any(), &ctx, &ctx.shutdown).await?;
    Ok(Action::await_change())
}

/// Back off on retryable errors; wait for a spec change otherwise
pub fn error_policy(owner: Arc<OpenShiftBuild>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(owner = %owner.name_any(), error = %error, "reconcile failed, requeueing");
        Action::requeue(Duration::from_secs(5))
    } else {
        error!(
            owner = %owner.name_any(),
            error = %error,
            "reconcile failed permanently, waiting for a change"
        );
        Action::await_change()
    }
}
