use std::sync::Arc;

use thiserror::Error;

use crate::store::{NamespaceStore, StoreError};
use crate::tasks::config::ControllerConfig;
use crate::tasks::label::ProtectedLabels;

/// Errors surfaced by a reconciliation pass
///
/// None of these are handled locally; the driver decides when to run the pass again.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to fetch namespace '{namespace}': {source}")]
    FetchNamespace {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to list NamespaceLabels in '{namespace}': {source}")]
    ListLabelIntents {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("Namespace '{namespace}' was modified concurrently, retry with fresh state")]
    Conflict { namespace: String },

    #[error("Failed to update namespace '{namespace}': {source}")]
    UpdateNamespace {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("Missing object key")]
    MissingObjectKey,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether running the pass again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::MissingObjectKey | Error::ConfigError(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared state handed to every reconciliation
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn NamespaceStore>,
    pub protected: Arc<ProtectedLabels>,
    pub config: Arc<ControllerConfig>,
}
