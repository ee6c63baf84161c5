use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, instrument};

use super::{NamespaceStore, StoreError, StoreResult};
use crate::crds::NamespaceLabel;

/// [`NamespaceStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NamespaceStore for KubeStore {
    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube("Namespace", name, e))
    }

    #[instrument(skip(self))]
    async fn list_label_intents(&self, namespace: &str) -> StoreResult<Vec<NamespaceLabel>> {
        let intents: Api<NamespaceLabel> = Api::namespaced(self.client.clone(), namespace);
        let list = intents
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube("NamespaceLabelList", namespace, e))?;
        debug!(count = list.items.len(), "Listed NamespaceLabels");
        Ok(list.items)
    }

    #[instrument(skip(self, namespace), fields(namespace = %namespace.name_any()))]
    async fn update_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let name = namespace.name_any();
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        // PUT carries metadata.resourceVersion; the API server answers 409 when it is stale.
        namespaces
            .replace(&name, &PostParams::default(), namespace)
            .await
            .map_err(|e| StoreError::from_kube("Namespace", &name, e))
    }
}
