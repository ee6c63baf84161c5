use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::debug;

use super::ProtectedLabels;
use crate::crds::NamespaceLabel;

/// Merge the labels of every intent into one desired label set.
///
/// Protected keys are dropped. Intents are merged in ascending `(namespace, name)` order
/// regardless of the order they were listed in, so when two intents declare the same key
/// the one whose name sorts last wins.
#[must_use]
pub fn aggregate_labels(
    policy: &ProtectedLabels,
    intents: &[NamespaceLabel],
) -> BTreeMap<String, String> {
    let mut ordered: Vec<&NamespaceLabel> = intents.iter().collect();
    ordered.sort_by_key(|intent| intent_key(intent));

    let mut desired: BTreeMap<String, String> = BTreeMap::new();
    // which intent last set each key, for override logging
    let mut sources: BTreeMap<&str, String> = BTreeMap::new();

    for intent in ordered {
        let source = intent.name_any();
        for (key, value) in &intent.spec.labels {
            if policy.is_protected(key) {
                debug!(
                    intent = %source,
                    label = %key,
                    "Ignoring protected label declared by NamespaceLabel"
                );
                continue;
            }

            if let Some(previous) = desired.insert(key.clone(), value.clone()) {
                if previous != *value {
                    debug!(
                        label = %key,
                        overridden = %sources.get(key.as_str()).map_or("", String::as_str),
                        winner = %source,
                        "Conflicting values for label, last NamespaceLabel by name wins"
                    );
                }
            }
            sources.insert(key.as_str(), source.clone());
        }
    }

    desired
}

fn intent_key(intent: &NamespaceLabel) -> (String, String) {
    (intent.namespace().unwrap_or_default(), intent.name_any())
}
