use crate::{
    api::{AuthorizationPolicy, PolicyBundle},
    validation,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Reads a YAML or JSON policy bundle from disk.
pub async fn load_bundle(path: &Path) -> Result<PolicyBundle> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    PolicyBundle::from_yaml(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Returns the policies that pass validation, logging the rest.
pub fn admit(policies: Vec<AuthorizationPolicy>, root_ns: &str) -> Vec<AuthorizationPolicy> {
    policies
        .into_iter()
        .filter(|policy| match validation::validate_policy(policy, root_ns) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    namespace = %policy.metadata.namespace_or_default(),
                    name = %policy.metadata.name,
                    %error,
                    "Rejected AuthorizationPolicy"
                );
                false
            }
        })
        .collect()
}
