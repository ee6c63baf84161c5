//! # Namespace Store
//!
//! The reconciler never talks to the API server directly. It reads namespaces and
//! `NamespaceLabel` resources and writes namespaces back through [`NamespaceStore`], so
//! the same pass can run against a live cluster ([`KubeStore`]) or an in-memory copy
//! ([`InMemoryStore`]).
//!
//! Writes are version-stamped: an update carries the `resourceVersion` it was computed
//! from and the store rejects it with [`StoreError::Conflict`] if the namespace changed in
//! the meantime.

pub mod kubernetes;
pub mod memory;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::Error as KubeError;
use thiserror::Error;

use crate::crds::NamespaceLabel;

pub use kubernetes::KubeStore;
pub use memory::InMemoryStore;

/// Errors returned by a [`NamespaceStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Namespace '{name}' was modified concurrently")]
    Conflict { name: String },

    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] KubeError),
}

impl StoreError {
    /// Classify a Kubernetes API error by HTTP status.
    #[must_use]
    pub fn from_kube(kind: &'static str, name: &str, err: KubeError) -> Self {
        match err {
            KubeError::Api(response) if response.code == 404 => StoreError::NotFound {
                kind,
                name: name.to_string(),
            },
            KubeError::Api(response) if response.code == 409 => StoreError::Conflict {
                name: name.to_string(),
            },
            other => StoreError::KubeError(other),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to namespaces and the `NamespaceLabel` resources scoped to them
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Fetch a namespace by name.
    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace>;

    /// List every `NamespaceLabel` in `namespace`.
    async fn list_label_intents(&self, namespace: &str) -> StoreResult<Vec<NamespaceLabel>>;

    /// Replace a namespace, failing with [`StoreError::Conflict`] when its
    /// `resourceVersion` is stale. Returns the stored object.
    async fn update_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace>;
}
