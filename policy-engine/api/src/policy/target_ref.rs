use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
const ISTIO_NETWORKING_GROUP: &str = "networking.istio.io";

/// Attaches a policy to a specific resource instead of selecting workloads
/// by label.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTargetReference {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A resource a workload is attached to, e.g. the Gateway it implements or
/// a Service it backs.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// The kinds of resources a policy may target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Gateway,
    GatewayClass,
    Service,
    ServiceEntry,
}

// === impl TargetKind ===

impl TargetKind {
    pub fn from_group_kind(group: &str, kind: &str) -> Option<Self> {
        let group = group.to_ascii_lowercase();
        match (group.as_str(), kind) {
            (GATEWAY_GROUP, "Gateway") => Some(Self::Gateway),
            (GATEWAY_GROUP, "GatewayClass") => Some(Self::GatewayClass),
            ("" | "core", "Service") => Some(Self::Service),
            (ISTIO_NETWORKING_GROUP, "ServiceEntry") => Some(Self::ServiceEntry),
            _ => None,
        }
    }

    /// GatewayClasses are cluster-scoped; every other kind lives in a
    /// namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, Self::GatewayClass)
    }
}

// === impl PolicyTargetReference ===

impl PolicyTargetReference {
    /// Returns the target ref kind, qualified by its group, if necessary.
    pub fn canonical_kind(&self) -> String {
        canonical_kind(&self.group, &self.kind)
    }

    pub fn target_kind(&self) -> Option<TargetKind> {
        TargetKind::from_group_kind(&self.group, &self.kind)
    }

    /// Checks whether the reference identifies `resource`. Namespaced
    /// references without a namespace refer to `local_ns`.
    pub fn targets(&self, resource: &ObjectRef, local_ns: &str) -> bool {
        let Some(kind) = self.target_kind() else {
            return false;
        };
        if resource.target_kind() != Some(kind) || resource.name != self.name {
            return false;
        }

        if !kind.is_namespaced() {
            return true;
        }

        let tns = self.namespace.as_deref().unwrap_or(local_ns);
        resource.namespace.as_deref() == Some(tns)
    }
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn canonical_kind(&self) -> String {
        canonical_kind(&self.group, &self.kind)
    }

    pub fn target_kind(&self) -> Option<TargetKind> {
        TargetKind::from_group_kind(&self.group, &self.kind)
    }
}

fn canonical_kind(group: &str, kind: &str) -> String {
    if group.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}.{group}")
    }
}
