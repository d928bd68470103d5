use crate::{
    policy::{Action, PolicyRef, PolicySelection},
    request::RequestContext,
};
use std::fmt;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    Allow,
    Deny,
}

/// The outcome of evaluating a request against a workload's policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub effect: Effect,

    /// Set when any AUDIT policy matched. Never affects `effect`.
    pub audit: bool,

    /// The policy that determined `effect`, if any.
    pub policy: Option<PolicyRef>,
}

/// Consults an external authorizer for CUSTOM policies.
#[async_trait::async_trait]
pub trait ExtensionAuthorizer {
    async fn check(&self, provider: &str, ctx: &RequestContext) -> Result<Effect, ExtensionError>;
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension provider {0:?} is not configured")]
    Unknown(String),

    #[error("extension provider {0:?} timed out")]
    Timeout(String),

    #[error("extension provider {provider:?} failed: {message}")]
    Failed { provider: String, message: String },
}

/// A CUSTOM policy matched but its extension could not produce a verdict.
///
/// The caller decides how to proceed; `fail_closed` builds the denial most
/// callers want.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{policy}: {error}")]
pub struct ExtensionFailure {
    pub policy: PolicyRef,
    #[source]
    pub error: ExtensionError,
    pub audit: bool,
}

/// An authorizer for deployments without extension providers.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoExtensions;

// === impl Effect ===

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny => f.write_str("DENY"),
        }
    }
}

// === impl Decision ===

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

// === impl ExtensionFailure ===

impl ExtensionFailure {
    pub fn fail_closed(&self) -> Decision {
        Decision {
            effect: Effect::Deny,
            audit: self.audit,
            policy: Some(self.policy.clone()),
        }
    }
}

// === impl NoExtensions ===

#[async_trait::async_trait]
impl ExtensionAuthorizer for NoExtensions {
    async fn check(&self, provider: &str, _: &RequestContext) -> Result<Effect, ExtensionError> {
        Err(ExtensionError::Unknown(provider.to_string()))
    }
}

/// Decides whether a request is allowed.
///
/// Policies are consulted in a fixed order: matching CUSTOM policies invoke
/// their extension providers and the first denial ends evaluation. Then any
/// matching DENY policy denies the request. If the workload has ALLOW
/// policies, one of them must match; otherwise the request is allowed. AUDIT
/// policies only set the audit flag.
pub async fn decide<E>(
    selection: &PolicySelection,
    ctx: &RequestContext,
    extensions: &E,
) -> Result<Decision, ExtensionFailure>
where
    E: ExtensionAuthorizer + ?Sized,
{
    let audit = selection.audit.iter().any(|p| p.matches(ctx));

    let mut consulted = Vec::<&str>::new();
    for policy in &selection.custom {
        let Action::Custom(provider) = &policy.action else {
            continue;
        };
        if consulted.contains(&provider.as_str()) || !policy.matches(ctx) {
            continue;
        }
        consulted.push(provider);

        match extensions.check(provider, ctx).await {
            Ok(Effect::Allow) => {
                trace!(policy = %policy.reference, %provider, "Extension allowed request");
            }
            Ok(Effect::Deny) => {
                debug!(policy = %policy.reference, %provider, "Extension denied request");
                return Ok(Decision {
                    effect: Effect::Deny,
                    audit,
                    policy: Some(policy.reference.clone()),
                });
            }
            Err(error) => {
                return Err(ExtensionFailure {
                    policy: policy.reference.clone(),
                    error,
                    audit,
                })
            }
        }
    }

    Ok(decide_local(selection, ctx, audit))
}

fn decide_local(selection: &PolicySelection, ctx: &RequestContext, audit: bool) -> Decision {
    if let Some(policy) = selection.deny.iter().find(|p| p.matches(ctx)) {
        return Decision {
            effect: Effect::Deny,
            audit,
            policy: Some(policy.reference.clone()),
        };
    }

    if selection.allow.is_empty() {
        return Decision {
            effect: Effect::Allow,
            audit,
            policy: None,
        };
    }

    match selection.allow.iter().find(|p| p.matches(ctx)) {
        Some(policy) => Decision {
            effect: Effect::Allow,
            audit,
            policy: Some(policy.reference.clone()),
        },
        None => Decision {
            effect: Effect::Deny,
            audit,
            policy: None,
        },
    }
}
