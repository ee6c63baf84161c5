//! # Namespace Label Synchronisation
//!
//! Keeps a namespace's labels equal to the union of the labels declared by the
//! `NamespaceLabel` resources in it.
//!
//! ## Architecture
//!
//! - **ProtectedLabels**: keys that are never added, changed or removed
//! - **aggregate_labels**: merges all intents into one desired set, protected keys dropped,
//!   duplicate keys resolved by intent name order
//! - **diff_labels**: stages the minimal add/update/remove operations against the
//!   namespace's current labels
//! - **reconcile_namespace**: one fetch, aggregate, diff, write pass against a
//!   [`NamespaceStore`](crate::store::NamespaceStore)
//!
//! After a successful pass the namespace carries exactly the desired set plus whichever
//! protected keys it already had. A pass over an already converged namespace writes
//! nothing.

pub mod aggregate;
pub mod diff;
pub mod protected;
pub mod reconcile;

pub use aggregate::aggregate_labels;
pub use diff::{diff_labels, LabelDiff, LabelOperation};
pub use protected::{ProtectedLabels, DEFAULT_PROTECTED_LABELS};
pub use reconcile::{plan_labels, reconcile_namespace, LabelPlan, ReconcileOutcome};
