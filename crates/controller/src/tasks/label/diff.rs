use std::collections::BTreeMap;

use serde::Serialize;

use super::ProtectedLabels;

/// A single change to a namespace's labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum LabelOperation {
    /// Key absent from the namespace
    Add { key: String, value: String },
    /// Key present with a different value
    Update { key: String, from: String, to: String },
    /// Key present on the namespace but declared by no intent
    Remove { key: String, value: String },
}

impl LabelOperation {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            LabelOperation::Add { key, .. }
            | LabelOperation::Update { key, .. }
            | LabelOperation::Remove { key, .. } => key,
        }
    }
}

/// Operations needed to bring a namespace's labels to the desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDiff {
    pub operations: Vec<LabelOperation>,
}

impl LabelDiff {
    /// `true` when the namespace already matches and no write is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Apply the staged operations to `current`.
    #[must_use]
    pub fn apply(&self, current: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut labels = current.clone();
        for operation in &self.operations {
            match operation {
                LabelOperation::Add { key, value }
                | LabelOperation::Update {
                    key, to: value, ..
                } => {
                    labels.insert(key.clone(), value.clone());
                }
                LabelOperation::Remove { key, .. } => {
                    labels.remove(key);
                }
            }
        }
        labels
    }
}

/// Stage the minimal changes that make `current` equal to `desired` plus the protected
/// keys `current` already carries.
///
/// Protected keys are never staged, in either direction, even if `desired` mentions them.
#[must_use]
pub fn diff_labels(
    policy: &ProtectedLabels,
    desired: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> LabelDiff {
    let mut operations = Vec::new();

    for (key, value) in desired {
        if policy.is_protected(key) {
            continue;
        }
        match current.get(key) {
            None => operations.push(LabelOperation::Add {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(existing) if existing != value => operations.push(LabelOperation::Update {
                key: key.clone(),
                from: existing.clone(),
                to: value.clone(),
            }),
            Some(_) => {}
        }
    }

    for (key, value) in current {
        if !policy.is_protected(key) && !desired.contains_key(key) {
            operations.push(LabelOperation::Remove {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    LabelDiff { operations }
}
