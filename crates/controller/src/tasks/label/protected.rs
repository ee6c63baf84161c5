use std::collections::BTreeSet;

/// Standard Kubernetes application labels owned by other tooling
/// <https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/>
pub const K8S_NAME: &str = "app.kubernetes.io/name";
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";
pub const K8S_VERSION: &str = "app.kubernetes.io/version";
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Set by the API server on every namespace and restored if removed
pub const K8S_METADATA_NAME: &str = "kubernetes.io/metadata.name";

/// Keys protected by [`ProtectedLabels::default`]
pub const DEFAULT_PROTECTED_LABELS: &[&str] = &[
    K8S_NAME,
    K8S_INSTANCE,
    K8S_VERSION,
    K8S_COMPONENT,
    K8S_PART_OF,
    K8S_MANAGED_BY,
    K8S_METADATA_NAME,
];

/// Label keys the controller never adds, changes or removes.
///
/// Built once at startup and shared read-only; there is no way to extend it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedLabels {
    keys: BTreeSet<String>,
}

impl ProtectedLabels {
    /// Policy protecting exactly `keys`.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_protected(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl Default for ProtectedLabels {
    fn default() -> Self {
        Self::from_keys(DEFAULT_PROTECTED_LABELS.iter().copied())
    }
}
