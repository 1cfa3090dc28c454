//! OpenShift Builds Operator - installs Shipwright builds and shared resources

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::api::DynamicObject;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;

use openshift_builds::bootstrap::bootstrap;
use openshift_builds::components::{default_components, shipwright_api_resource};
use openshift_builds::config::{Cli, OperatorConfig};
use openshift_builds::controller::{error_policy, reconcile, Context, OwnerClientImpl};
use openshift_builds::manifest::Manifest;
use openshift_builds_common::crd::OpenShiftBuild;
use openshift_builds_common::kube_utils::KubeStore;
use openshift_builds_common::retry::RetryConfig;
use openshift_builds_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&OpenShiftBuild::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig { json: cli.log_json })?;

    let config = OperatorConfig::from(&cli);
    run_controller(config).await
}

/// Run the OpenShiftBuild controller until a shutdown signal arrives
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        namespace = %config.namespace,
        manifests = %config.manifest_path.display(),
        "Starting OpenShift Builds operator"
    );

    // Templates are read once; a broken manifest set is fatal at startup
    let manifest = Manifest::load(&config.manifest_path, config.recursive)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::info!(resources = manifest.len(), "Loaded shared resource manifests");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let store = KubeStore::new(client.clone())
        .await
        .map_err(|e| anyhow::anyhow!("API discovery failed: {}", e))?;
    let owners = Arc::new(OwnerClientImpl::new(client.clone()));

    if config.skip_bootstrap {
        tracing::info!("Skipping default OpenShiftBuild bootstrap");
    } else {
        bootstrap(owners.as_ref(), &RetryConfig::default())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap OpenShiftBuild: {}", e))?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let ctx = Arc::new(
        Context::builder(owners, Arc::new(store))
            .components(default_components(&config, manifest))
            .image_prefix(config.image_prefix.clone())
            .call_timeout(config.store_timeout)
            .shutdown(shutdown)
            .build(),
    );

    let owners_api: Api<OpenShiftBuild> = Api::all(client.clone());
    // ShipwrightBuild edits or deletions requeue the owning OpenShiftBuild
    let shipwright = shipwright_api_resource();
    let shipwright_api: Api<DynamicObject> = Api::all_with(client, &shipwright);

    tracing::info!("Starting OpenShiftBuild controller");
    Controller::new(owners_api, WatcherConfig::default())
        .owns_with(shipwright_api, shipwright, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => tracing::debug!(?action, "Reconciliation completed"),
                Err(e) => tracing::error!(error = ?e, "Reconciliation error"),
            }
        })
        .await;

    tracing::info!("Operator shutting down");
    Ok(())
}

/// Cancel in-flight store calls once SIGTERM or SIGINT is received
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received, cancelling in-flight calls");
    token.cancel();
}
