/*
 * 5D Labs Namespace Label Controller - Kubernetes namespace label synchronisation
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Namespace label controller library
//!
//! Keeps the labels of each namespace equal to the union of the labels declared by the
//! `NamespaceLabel` resources living in it, while never touching a fixed set of
//! protected keys.

pub mod crds;
pub mod store;
pub mod tasks;

// Re-export commonly used types
pub use crds::{NamespaceLabel, NamespaceLabelSpec};
pub use store::{InMemoryStore, KubeStore, NamespaceStore, StoreError};
pub use tasks::config::ControllerConfig;
pub use tasks::label::{reconcile_namespace, ProtectedLabels, ReconcileOutcome};
pub use tasks::{Error, Result};
