use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::{aggregate_labels, diff_labels, LabelOperation, ProtectedLabels};
use crate::crds::NamespaceLabel;
use crate::store::{NamespaceStore, StoreError};
use crate::tasks::types::{Error, Result};

/// Labels a namespace should carry after a pass, computed without I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPlan {
    pub changed: bool,
    pub labels: BTreeMap<String, String>,
    pub operations: Vec<LabelOperation>,
}

/// Aggregate `intents`, diff against `current` and produce the labels to write back.
#[must_use]
pub fn plan_labels(
    policy: &ProtectedLabels,
    current: &BTreeMap<String, String>,
    intents: &[NamespaceLabel],
) -> LabelPlan {
    let desired = aggregate_labels(policy, intents);
    let diff = diff_labels(policy, &desired, current);
    LabelPlan {
        changed: !diff.is_empty(),
        labels: diff.apply(current),
        operations: diff.operations,
    }
}

/// How a reconciliation pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The namespace no longer exists or is terminating
    NamespaceGone,
    /// Labels already matched, nothing was written
    Unchanged,
    /// Labels were written
    Updated { operations: Vec<LabelOperation> },
}

/// Run one reconciliation pass for the namespace called `name`.
///
/// Store failures are returned as-is for the caller to retry; nothing is retried here.
#[instrument(skip(store, policy))]
pub async fn reconcile_namespace<S>(
    store: &S,
    policy: &ProtectedLabels,
    name: &str,
) -> Result<ReconcileOutcome>
where
    S: NamespaceStore + ?Sized,
{
    let mut namespace = match store.get_namespace(name).await {
        Ok(namespace) => namespace,
        Err(StoreError::NotFound { .. }) => {
            debug!("Namespace no longer exists, nothing to reconcile");
            return Ok(ReconcileOutcome::NamespaceGone);
        }
        Err(source) => {
            return Err(Error::FetchNamespace {
                namespace: name.to_string(),
                source,
            });
        }
    };

    if namespace.metadata.deletion_timestamp.is_some() {
        debug!("Namespace is terminating, skipping");
        return Ok(ReconcileOutcome::NamespaceGone);
    }

    let intents = store
        .list_label_intents(name)
        .await
        .map_err(|source| Error::ListLabelIntents {
            namespace: name.to_string(),
            source,
        })?;
    debug!(intents = intents.len(), "Listed NamespaceLabels");

    let plan = plan_labels(policy, namespace.labels(), &intents);
    if !plan.changed {
        debug!("Namespace labels already up to date");
        return Ok(ReconcileOutcome::Unchanged);
    }

    for operation in &plan.operations {
        debug!(label = %operation.key(), ?operation, "Staged label change");
    }

    apply_labels(&mut namespace, plan.labels);
    match store.update_namespace(&namespace).await {
        Ok(_) => {
            let operations = serde_json::to_string(&plan.operations).unwrap_or_default();
            info!(
                changes = plan.operations.len(),
                %operations,
                "Updated namespace labels"
            );
            Ok(ReconcileOutcome::Updated {
                operations: plan.operations,
            })
        }
        Err(StoreError::NotFound { .. }) => {
            debug!("Namespace was deleted before its labels could be written");
            Ok(ReconcileOutcome::NamespaceGone)
        }
        Err(StoreError::Conflict { .. }) => {
            warn!("Namespace changed while reconciling, will retry");
            Err(Error::Conflict {
                namespace: name.to_string(),
            })
        }
        Err(source) => Err(Error::UpdateNamespace {
            namespace: name.to_string(),
            source,
        }),
    }
}

fn apply_labels(namespace: &mut Namespace, labels: BTreeMap<String, String>) {
    namespace.metadata.labels = Some(labels);
}
