use crate::crds::NamespaceLabel;
use crate::store::KubeStore;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ListParams;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

pub mod config;
pub mod label;
pub mod types;

// Re-export commonly used items
pub use config::ControllerConfig;
pub use label::{reconcile_namespace, ProtectedLabels, ReconcileOutcome};
pub use types::{Context, Error, Result};

/// Main entry point for the namespace label controller
///
/// Namespaces are the primary resource; every `NamespaceLabel` event is mapped to the
/// namespace it lives in, so creating, editing or deleting an intent triggers a pass for
/// that namespace.
///
/// Every namespace in the cluster is reconciled, including ones no `NamespaceLabel` targets.
/// A namespace without intents has all of its labels outside the protected set removed on
/// its first pass, so system namespaces such as `kube-system` lose labels like
/// `pod-security.kubernetes.io/enforce` unless an intent declares them.
#[instrument(skip(client, config))]
pub async fn run_label_controller(client: Client, config: Arc<ControllerConfig>) -> Result<()> {
    info!(
        "Starting namespace label controller: every namespace is reconciled, and labels \
         outside the protected set that no NamespaceLabel declares will be removed"
    );

    if let Err(validation_error) = config.validate() {
        error!("Configuration validation failed: {}", validation_error);
        return Err(Error::ConfigError(validation_error.to_string()));
    }

    let protected = Arc::new(ProtectedLabels::default());
    info!(
        protected = ?protected.keys().collect::<Vec<_>>(),
        "Protected label keys"
    );

    let context = Arc::new(Context {
        store: Arc::new(KubeStore::new(client.clone())),
        protected,
        config,
    });

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let intents: Api<NamespaceLabel> = Api::all(client.clone());

    // Startup visibility: how many intents the controller is about to act on
    match intents.list(&ListParams::default()).await {
        Ok(list) => {
            info!(
                "Controller startup: found {} NamespaceLabel(s) across the cluster",
                list.items.len()
            );
        }
        Err(e) => {
            warn!("Failed to list NamespaceLabels at startup: {}", e);
        }
    }

    let watcher_config = Config::default().any_semantic();

    Controller::new(namespaces, watcher_config.clone())
        .watches(intents, watcher_config, |intent| {
            intent
                .namespace()
                .map(|namespace| ObjectRef::<Namespace>::new(&namespace))
        })
        .run(reconcile_namespace_labels, error_policy, context)
        .for_each(|reconciliation_result| {
            let span = tracing::info_span!("namespace_label_reconciliation_result");
            async move {
                match reconciliation_result {
                    Ok((namespace, _action)) => {
                        debug!(
                            namespace = %namespace.name,
                            "Namespace label reconciliation successful"
                        );
                    }
                    Err(reconciliation_err) => {
                        warn!(
                            error = %reconciliation_err,
                            "Namespace label reconciliation error"
                        );
                    }
                }
            }
            .instrument(span)
        })
        .await;

    info!("Namespace label controller shutting down");
    Ok(())
}

/// Reconcile callback invoked by the controller runtime for one namespace
#[instrument(skip(namespace, ctx), fields(namespace = %namespace.name_any()))]
pub async fn reconcile_namespace_labels(
    namespace: Arc<Namespace>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let name = namespace
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingObjectKey)?;

    let outcome = reconcile_namespace(ctx.store.as_ref(), &ctx.protected, &name).await?;
    debug!(?outcome, "Reconciliation pass finished");

    Ok(next_action(&ctx.config))
}

fn next_action(config: &ControllerConfig) -> Action {
    config
        .reconcile
        .resync_interval()
        .map_or_else(Action::await_change, Action::requeue)
}

/// Error policy: every failure is retried, conflicts sooner than the rest
#[instrument(skip(namespace, ctx), fields(namespace = %namespace.name_any()))]
fn error_policy(namespace: Arc<Namespace>, err: &Error, ctx: Arc<Context>) -> Action {
    retry_action(err, &ctx.config)
}

fn retry_action(err: &Error, config: &ControllerConfig) -> Action {
    if err.is_conflict() {
        debug!(error = %err, "Conflict while updating namespace, requeueing");
        Action::requeue(config.reconcile.conflict_requeue())
    } else if err.is_retryable() {
        error!(error = %err, "Namespace label reconciliation failed, requeueing");
        Action::requeue(config.reconcile.error_requeue())
    } else {
        error!(error = %err, "Namespace label reconciliation failed permanently");
        Action::await_change()
    }
}
