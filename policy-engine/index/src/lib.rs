//! Mesh authorization policy index
//!
//! The index holds every known `AuthorizationPolicy`, converted into its
//! evaluation form, and publishes immutable snapshots for lookups:
//!
//! - Each policy is scoped to its namespace. A policy without a selector
//!   applies to every workload in the namespace; a policy with a selector
//!   applies to workloads whose labels match it.
//! - Policies in the root namespace apply to workloads in every namespace,
//!   unless they target specific resources.
//! - A policy with target references applies only to workloads attached to
//!   one of the referenced Gateways, GatewayClasses, Services or
//!   ServiceEntries.
//!
//! ```text
//! [ Workload ] <- [ AuthorizationPolicy ] -> [ Gateway | Service | ... ]
//! ```
//!
//! Updates are applied by a single writer. Every update publishes a new
//! snapshot; a reset replaces the whole policy set with a single
//! publication, so lookups never observe a partially applied bundle.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authorization_policy;
mod lookup;
pub mod metrics;
pub mod scope;
pub mod workload;

#[cfg(test)]
mod tests;

pub use self::{
    authorization_policy::IndexedPolicy,
    lookup::{Reader, Snapshot},
    metrics::IndexMetrics,
    scope::Scope,
    workload::Workload,
};
use mesh_authz_api as api;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds mesh metadata.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// The namespace whose policies apply mesh-wide.
    pub root_namespace: String,
}

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds all indexing state. Owned and updated by a single task, publishing
/// snapshots to the shared lookup handle.
#[derive(Debug)]
pub struct Index {
    cluster_info: ClusterInfo,

    /// Policies by namespace and name.
    policies: lookup::ByNs,

    version: u64,

    /// A handle that supports updates to the lookup index.
    lookups: lookup::Writer,

    metrics: IndexMetrics,
}

// === impl Index ===

impl Index {
    pub fn shared(cluster_info: ClusterInfo, metrics: IndexMetrics) -> (Reader, SharedIndex) {
        let (lookups, reader) = lookup::pair(cluster_info.root_namespace.clone());
        let idx = Self {
            cluster_info,
            policies: Default::default(),
            version: 0,
            lookups,
            metrics,
        };
        (reader, Arc::new(RwLock::new(idx)))
    }

    pub fn cluster_info(&self) -> &ClusterInfo {
        &self.cluster_info
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Adds or replaces a policy. Invalid policies are ignored, leaving any
    /// previous version of the policy in place.
    pub fn apply(&mut self, policy: api::AuthorizationPolicy) {
        let namespace = policy.metadata.namespace_or_default().to_string();
        let name = policy.metadata.name.clone();
        self.metrics.applied(&namespace);

        if !self.insert(policy) {
            return;
        }
        self.publish();
        self.metrics
            .set_size(&namespace, self.size(&namespace));
        tracing::debug!(%namespace, %name, version = self.version, "Applied policy");
    }

    /// Removes a policy, if it exists.
    pub fn delete(&mut self, namespace: &str, name: &str) {
        self.metrics.deleted(namespace);

        let Some(policies) = self.policies.get_mut(namespace) else {
            tracing::debug!(%namespace, %name, "Unknown namespace");
            return;
        };
        if policies.remove(name).is_none() {
            tracing::debug!(%namespace, %name, "Unknown policy");
            return;
        }
        if policies.is_empty() {
            self.policies.remove(namespace);
        }

        self.publish();
        self.metrics.set_size(namespace, self.size(namespace));
        tracing::debug!(%namespace, %name, version = self.version, "Deleted policy");
    }

    /// Replaces all policies, publishing a single snapshot.
    pub fn reset(&mut self, policies: Vec<api::AuthorizationPolicy>) {
        self.metrics.reset();

        let prior = std::mem::take(&mut self.policies);
        for policy in policies {
            self.insert(policy);
        }

        self.publish();
        for ns in prior.keys().chain(self.policies.keys()) {
            self.metrics.set_size(ns, self.size(ns));
        }
        tracing::info!(
            policies = self.policies.values().map(|ps| ps.len()).sum::<usize>(),
            version = self.version,
            "Reset policies"
        );
    }

    /// Converts and stores a policy without publishing it.
    fn insert(&mut self, policy: api::AuthorizationPolicy) -> bool {
        let namespace = policy.metadata.namespace_or_default().to_string();
        let name = policy.metadata.name.clone();

        let indexed =
            match authorization_policy::convert(policy, &self.cluster_info.root_namespace) {
                Ok(indexed) => indexed,
                Err(error) => {
                    self.metrics.rejected(&namespace);
                    tracing::warn!(%namespace, %name, error = %format!("{error:#}"), "Invalid AuthorizationPolicy");
                    return false;
                }
            };

        self.policies
            .entry(namespace)
            .or_default()
            .insert(name, indexed);
        true
    }

    fn publish(&mut self) {
        self.version += 1;
        self.lookups.publish(Snapshot::new(
            self.version,
            self.cluster_info.root_namespace.clone(),
            self.policies.clone(),
        ));
    }

    fn size(&self, namespace: &str) -> usize {
        self.policies.get(namespace).map(|ps| ps.len()).unwrap_or(0)
    }
}
