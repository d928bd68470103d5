pub mod authorization_policy;
pub mod target_ref;

pub use self::{
    authorization_policy::{AuthorizationPolicy, AuthorizationPolicySpec},
    target_ref::{ObjectRef, PolicyTargetReference, TargetKind},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The namespace assumed for resources that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}
