//! `NamespaceLabel` Custom Resource Definition for declaring namespace labels

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labels a user wants applied to the namespace this resource lives in.
///
/// Any number of `NamespaceLabel` resources may coexist in one namespace; the controller
/// applies the union of their labels.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(group = "dana.io", version = "v1alpha1", kind = "NamespaceLabel")]
#[kube(namespaced)]
#[kube(shortname = "nslabel")]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct NamespaceLabelSpec {
    /// Label key/value pairs to set on the namespace
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NamespaceLabel {
    /// Build an intent named `name` in `namespace` declaring `labels`.
    pub fn with_labels<I, K, V>(namespace: &str, name: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut intent = NamespaceLabel::new(
            name,
            NamespaceLabelSpec {
                labels: labels
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        );
        intent.metadata.namespace = Some(namespace.to_string());
        intent
    }
}
