//! End-to-end reconciliation passes against the in-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use namespace_label_controller::store::StoreResult;
use namespace_label_controller::tasks::label::LabelOperation;
use namespace_label_controller::{
    reconcile_namespace, Error, InMemoryStore, NamespaceLabel, NamespaceStore, ProtectedLabels,
    ReconcileOutcome,
};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

async fn pass(store: &InMemoryStore, namespace: &str) -> ReconcileOutcome {
    reconcile_namespace(store, &ProtectedLabels::default(), namespace)
        .await
        .expect("reconciliation pass should succeed")
}

#[tokio::test]
async fn removes_stale_labels_and_keeps_protected_ones() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("app.kubernetes.io/name", "svc"), ("stale", "x")]);
    store.apply_intent(NamespaceLabel::with_labels(
        "ns1",
        "payments",
        [("team", "payments"), ("app.kubernetes.io/name", "ignored")],
    ));

    pass(&store, "ns1").await;

    assert_eq!(
        store.namespace_labels("ns1").unwrap(),
        labels(&[("app.kubernetes.io/name", "svc"), ("team", "payments")])
    );
}

#[tokio::test]
async fn converges_to_union_of_intents() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("kubernetes.io/metadata.name", "ns1")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));
    store.apply_intent(NamespaceLabel::with_labels("ns1", "b", [("env", "prod"), ("tier", "1")]));
    // intents in other namespaces never leak in
    store.apply_intent(NamespaceLabel::with_labels("ns2", "c", [("other", "yes")]));

    pass(&store, "ns1").await;

    assert_eq!(
        store.namespace_labels("ns1").unwrap(),
        labels(&[
            ("env", "prod"),
            ("kubernetes.io/metadata.name", "ns1"),
            ("team", "payments"),
            ("tier", "1"),
        ])
    );
}

#[tokio::test]
async fn second_pass_performs_no_writes() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("stale", "x")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));

    assert!(matches!(pass(&store, "ns1").await, ReconcileOutcome::Updated { .. }));
    assert_eq!(store.update_count(), 1);

    assert_eq!(pass(&store, "ns1").await, ReconcileOutcome::Unchanged);
    assert_eq!(pass(&store, "ns1").await, ReconcileOutcome::Unchanged);
    assert_eq!(store.update_count(), 1);
}

#[tokio::test]
async fn already_converged_namespace_is_not_written() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("team", "payments"), ("app.kubernetes.io/part-of", "x")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));

    assert_eq!(pass(&store, "ns1").await, ReconcileOutcome::Unchanged);
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn protected_values_survive_any_intent() {
    let store = InMemoryStore::new();
    store.put_namespace(
        "ns1",
        [
            ("app.kubernetes.io/managed-by", "helm"),
            ("app.kubernetes.io/version", "1.2.3"),
        ],
    );
    store.apply_intent(NamespaceLabel::with_labels(
        "ns1",
        "hostile",
        [
            ("app.kubernetes.io/managed-by", "me"),
            ("app.kubernetes.io/instance", "new"),
            ("app.kubernetes.io/version", "9.9.9"),
        ],
    ));

    assert_eq!(pass(&store, "ns1").await, ReconcileOutcome::Unchanged);
    assert_eq!(
        store.namespace_labels("ns1").unwrap(),
        labels(&[
            ("app.kubernetes.io/managed-by", "helm"),
            ("app.kubernetes.io/version", "1.2.3"),
        ])
    );
}

#[tokio::test]
async fn deleting_last_declaring_intent_removes_label() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", Vec::<(String, String)>::new());
    store.apply_intent(NamespaceLabel::with_labels(
        "ns1",
        "a",
        [("team", "payments"), ("env", "prod")],
    ));
    store.apply_intent(NamespaceLabel::with_labels("ns1", "b", [("env", "prod")]));
    pass(&store, "ns1").await;

    store.delete_intent("ns1", "a");
    let outcome = pass(&store, "ns1").await;

    assert_eq!(
        outcome,
        ReconcileOutcome::Updated {
            operations: vec![LabelOperation::Remove {
                key: "team".to_string(),
                value: "payments".to_string(),
            }],
        }
    );
    // still declared by "b"
    assert_eq!(store.namespace_labels("ns1").unwrap(), labels(&[("env", "prod")]));

    store.delete_intent("ns1", "b");
    pass(&store, "ns1").await;
    assert!(store.namespace_labels("ns1").unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_keys_resolve_to_the_same_winner_every_time() {
    for _ in 0..5 {
        let store = InMemoryStore::new();
        store.put_namespace("ns1", Vec::<(String, String)>::new());
        store.apply_intent(NamespaceLabel::with_labels("ns1", "zeta", [("tier", "silver")]));
        store.apply_intent(NamespaceLabel::with_labels("ns1", "alpha", [("tier", "gold")]));

        pass(&store, "ns1").await;
        assert_eq!(store.namespace_labels("ns1").unwrap()["tier"], "silver");

        assert_eq!(pass(&store, "ns1").await, ReconcileOutcome::Unchanged);
    }
}

#[tokio::test]
async fn deleted_namespace_is_a_clean_no_op() {
    let store = InMemoryStore::new();
    store.apply_intent(NamespaceLabel::with_labels("gone", "a", [("team", "payments")]));

    assert_eq!(pass(&store, "gone").await, ReconcileOutcome::NamespaceGone);
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn namespace_without_intents_keeps_only_protected_labels() {
    let store = InMemoryStore::new();
    store.put_namespace(
        "kube-system",
        [
            ("kubernetes.io/metadata.name", "kube-system"),
            ("pod-security.kubernetes.io/enforce", "privileged"),
        ],
    );

    pass(&store, "kube-system").await;

    assert_eq!(
        store.namespace_labels("kube-system").unwrap(),
        labels(&[("kubernetes.io/metadata.name", "kube-system")])
    );
}

#[tokio::test]
async fn external_label_edits_are_reverted() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", Vec::<(String, String)>::new());
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));
    pass(&store, "ns1").await;

    store.set_namespace_label("ns1", "team", "hijacked");
    store.set_namespace_label("ns1", "extra", "1");
    pass(&store, "ns1").await;

    assert_eq!(store.namespace_labels("ns1").unwrap(), labels(&[("team", "payments")]));
}

#[tokio::test]
async fn alternate_policy_protects_its_own_keys() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("owner", "platform"), ("app.kubernetes.io/name", "svc")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("owner", "me")]));

    let policy = ProtectedLabels::from_keys(["owner"]);
    reconcile_namespace(&store, &policy, "ns1").await.unwrap();

    // app.kubernetes.io/name is not protected by this policy and nobody declares it
    assert_eq!(store.namespace_labels("ns1").unwrap(), labels(&[("owner", "platform")]));
}

#[tokio::test]
async fn concurrent_modification_surfaces_conflict_and_retry_converges() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("stale", "x")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));

    // a writer that races the pass: the namespace changes between read and write
    let racing = RacingStore {
        inner: &store,
        raced: AtomicBool::new(false),
    };
    let err = reconcile_namespace(&racing, &ProtectedLabels::default(), "ns1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert!(err.is_retryable());
    assert_eq!(store.update_count(), 0);

    // the retry recomputes from fresh state
    pass(&store, "ns1").await;
    assert_eq!(store.namespace_labels("ns1").unwrap(), labels(&[("team", "payments")]));
}

#[tokio::test]
async fn namespace_deleted_mid_pass_ends_cleanly() {
    let store = InMemoryStore::new();
    store.put_namespace("ns1", [("stale", "x")]);
    store.apply_intent(NamespaceLabel::with_labels("ns1", "a", [("team", "payments")]));

    // the namespace finishes terminating between the read and the write
    let deleting = DeletingStore { inner: &store };
    let outcome = reconcile_namespace(&deleting, &ProtectedLabels::default(), "ns1")
        .await
        .expect("a namespace deleted mid-pass is not an error");

    assert_eq!(outcome, ReconcileOutcome::NamespaceGone);
    assert_eq!(store.namespace_labels("ns1"), None);
    assert_eq!(store.update_count(), 0);
}

struct RacingStore<'a> {
    inner: &'a InMemoryStore,
    raced: AtomicBool,
}

#[async_trait]
impl NamespaceStore for RacingStore<'_> {
    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        self.inner.get_namespace(name).await
    }

    async fn list_label_intents(&self, namespace: &str) -> StoreResult<Vec<NamespaceLabel>> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.set_namespace_label(namespace, "stale", "y");
        }
        self.inner.list_label_intents(namespace).await
    }

    async fn update_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        self.inner.update_namespace(namespace).await
    }
}

struct DeletingStore<'a> {
    inner: &'a InMemoryStore,
}

#[async_trait]
impl NamespaceStore for DeletingStore<'_> {
    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        self.inner.get_namespace(name).await
    }

    async fn list_label_intents(&self, namespace: &str) -> StoreResult<Vec<NamespaceLabel>> {
        let intents = self.inner.list_label_intents(namespace).await;
        self.inner.delete_namespace(namespace);
        intents
    }

    async fn update_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        self.inner.update_namespace(namespace).await
    }
}
