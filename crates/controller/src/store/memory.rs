use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::core::ObjectMeta;
use kube::ResourceExt;

use super::{NamespaceStore, StoreError, StoreResult};
use crate::crds::NamespaceLabel;

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Namespace>,
    // keyed by (namespace, name)
    intents: BTreeMap<(String, String), NamespaceLabel>,
    last_version: u64,
    updates: usize,
}

impl State {
    fn stamp(&mut self, namespace: &mut Namespace) {
        self.last_version += 1;
        namespace.metadata.resource_version = Some(self.last_version.to_string());
    }
}

/// In-memory [`NamespaceStore`] with API-server-like optimistic concurrency.
///
/// Every namespace write stamps a fresh `resourceVersion`; `update_namespace` rejects
/// objects carrying an older one. Seeding and mutation helpers stand in for the external
/// actors that create, edit and delete resources.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a namespace named `name` with `labels`, as an external actor would.
    pub fn put_namespace<I, K, V>(&self, name: &str, labels: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                ),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        let mut state = self.lock();
        state.stamp(&mut namespace);
        state.namespaces.insert(name.to_string(), namespace);
    }

    /// Set a single label outside of any reconciliation pass.
    pub fn set_namespace_label(&self, name: &str, key: &str, value: &str) {
        let mut state = self.lock();
        if let Some(mut namespace) = state.namespaces.remove(name) {
            namespace
                .labels_mut()
                .insert(key.to_string(), value.to_string());
            state.stamp(&mut namespace);
            state.namespaces.insert(name.to_string(), namespace);
        }
    }

    /// Remove a namespace, as if it had finished terminating.
    pub fn delete_namespace(&self, name: &str) {
        self.lock().namespaces.remove(name);
    }

    /// Current labels of a namespace, `None` if it does not exist.
    #[must_use]
    pub fn namespace_labels(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.lock()
            .namespaces
            .get(name)
            .map(|ns| ns.labels().clone())
    }

    /// Create or replace a `NamespaceLabel`.
    pub fn apply_intent(&self, intent: NamespaceLabel) {
        let key = (intent.namespace().unwrap_or_default(), intent.name_any());
        self.lock().intents.insert(key, intent);
    }

    pub fn delete_intent(&self, namespace: &str, name: &str) {
        self.lock()
            .intents
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Number of namespace updates accepted through [`NamespaceStore::update_namespace`].
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.lock().updates
    }
}

#[async_trait]
impl NamespaceStore for InMemoryStore {
    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        self.lock()
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Namespace",
                name: name.to_string(),
            })
    }

    async fn list_label_intents(&self, namespace: &str) -> StoreResult<Vec<NamespaceLabel>> {
        Ok(self
            .lock()
            .intents
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, intent)| intent.clone())
            .collect())
    }

    async fn update_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let name = namespace.name_any();
        let mut state = self.lock();

        let Some(stored) = state.namespaces.get(&name) else {
            return Err(StoreError::NotFound {
                kind: "Namespace",
                name,
            });
        };

        if stored.metadata.resource_version != namespace.metadata.resource_version {
            return Err(StoreError::Conflict { name });
        }

        let mut updated = namespace.clone();
        state.stamp(&mut updated);
        state.updates += 1;
        state.namespaces.insert(name, updated.clone());
        Ok(updated)
    }
}
