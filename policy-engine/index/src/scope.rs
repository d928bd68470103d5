use crate::workload::Workload;
use mesh_authz_api::{policy::TargetKind, PolicyTargetReference, WorkloadSelector};

/// Determines which workloads a policy applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Applies to every workload in the policy's namespace.
    Namespace,

    /// Applies to workloads in the policy's namespace whose labels match.
    Selector(WorkloadSelector),

    /// Applies to workloads attached to one of the referenced resources.
    TargetRefs(Vec<PolicyTargetReference>),
}

impl Scope {
    /// Returns true if a policy in `policy_ns` with this scope applies to
    /// `workload`.
    ///
    /// Namespace- and selector-scoped policies in the root namespace apply to
    /// workloads in every namespace. Target references are resolved relative
    /// to the policy's namespace, except for cluster-scoped kinds.
    pub fn applies(&self, policy_ns: &str, root_ns: &str, workload: &Workload) -> bool {
        match self {
            Self::TargetRefs(targets) => targets.iter().any(|t| {
                workload
                    .attachments
                    .iter()
                    .any(|a| t.targets(a, policy_ns))
            }),
            Self::Namespace => in_scope(policy_ns, root_ns, workload),
            Self::Selector(selector) => {
                in_scope(policy_ns, root_ns, workload) && selector.matches(&workload.labels)
            }
        }
    }

    /// Returns true if the scope references a cluster-scoped resource. Such
    /// policies are only honored in the root namespace.
    pub fn is_cluster_scoped(&self) -> bool {
        match self {
            Self::TargetRefs(targets) => targets
                .iter()
                .any(|t| t.target_kind() == Some(TargetKind::GatewayClass)),
            _ => false,
        }
    }
}

fn in_scope(policy_ns: &str, root_ns: &str, workload: &Workload) -> bool {
    policy_ns == workload.namespace || policy_ns == root_ns
}
