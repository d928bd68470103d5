use crate::{authorization_policy::IndexedPolicy, workload::Workload};
use ahash::AHashMap as HashMap;
use mesh_authz_core::PolicySelection;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Writer(Shared);

/// Supports lookups against the most recently published snapshot.
#[derive(Clone, Debug)]
pub struct Reader(Shared);

type Shared = Arc<RwLock<Arc<Snapshot>>>;

pub(crate) type ByNs = HashMap<String, ByName>;
pub(crate) type ByName = HashMap<String, IndexedPolicy>;

/// An immutable view of all indexed policies.
///
/// Evaluations hold a snapshot for their whole duration, so a concurrent
/// update is either entirely visible to an evaluation or not at all.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    root_namespace: String,
    by_ns: ByNs,
}

pub(crate) fn pair(root_namespace: String) -> (Writer, Reader) {
    let shared = Arc::new(RwLock::new(Arc::new(Snapshot {
        version: 0,
        root_namespace,
        by_ns: ByNs::default(),
    })));
    (Writer(shared.clone()), Reader(shared))
}

// === impl Writer ===

impl Writer {
    /// Replaces the published snapshot.
    pub(crate) fn publish(&self, snapshot: Snapshot) {
        *self.0.write() = Arc::new(snapshot);
    }
}

// === impl Reader ===

impl Reader {
    #[inline]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.0.read().clone()
    }

    /// Selects the policies that apply to `workload` in the current
    /// snapshot.
    pub fn select(&self, workload: &Workload) -> PolicySelection {
        self.snapshot().select(workload)
    }
}

// === impl Snapshot ===

impl Snapshot {
    pub(crate) fn new(version: u64, root_namespace: String, by_ns: ByNs) -> Self {
        Self {
            version,
            root_namespace,
            by_ns,
        }
    }

    /// Increases monotonically with every publication.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root_namespace(&self) -> &str {
        &self.root_namespace
    }

    /// The total number of policies in the snapshot.
    pub fn len(&self) -> usize {
        self.by_ns.values().map(|ps| ps.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&IndexedPolicy> {
        self.by_ns.get(namespace)?.get(name)
    }

    /// Returns the policies that apply to `workload`, partitioned by action
    /// and ordered by namespace and name.
    pub fn select(&self, workload: &Workload) -> PolicySelection {
        let selection = self
            .by_ns
            .iter()
            .flat_map(|(ns, policies)| {
                policies
                    .values()
                    .filter(move |p| p.scope.applies(ns, &self.root_namespace, workload))
            })
            .map(|p| p.policy.clone())
            .collect::<PolicySelection>();
        tracing::trace!(
            namespace = %workload.namespace,
            version = self.version,
            policies = selection.len(),
            "Selected policies"
        );
        selection
    }
}
