use crate::{authorization::Rule, request::RequestContext};
use std::{fmt, sync::Arc};

/// Identifies a policy by namespace and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyRef {
    pub namespace: String,
    pub name: String,
}

/// What a policy does with the requests its rules match. Only `Custom`
/// carries an extension provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Allow,
    Deny,
    Audit,
    Custom(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    pub reference: PolicyRef,
    pub action: Action,
    pub rules: Vec<Rule>,
}

/// The policies that apply to a single workload, partitioned by action and
/// ordered by reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicySelection {
    pub custom: Vec<Arc<AuthorizationPolicy>>,
    pub deny: Vec<Arc<AuthorizationPolicy>>,
    pub allow: Vec<Arc<AuthorizationPolicy>>,
    pub audit: Vec<Arc<AuthorizationPolicy>>,
}

// === impl PolicyRef ===

impl PolicyRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Action ===

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny => f.write_str("DENY"),
            Self::Audit => f.write_str("AUDIT"),
            Self::Custom(provider) => write!(f, "CUSTOM({provider})"),
        }
    }
}

// === impl AuthorizationPolicy ===

impl AuthorizationPolicy {
    /// A policy matches a request if any of its rules does. A policy without
    /// rules matches nothing.
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.rules.iter().any(|rule| rule.matches(ctx))
    }
}

// === impl PolicySelection ===

impl PolicySelection {
    pub fn push(&mut self, policy: Arc<AuthorizationPolicy>) {
        match policy.action {
            Action::Allow => self.allow.push(policy),
            Action::Deny => self.deny.push(policy),
            Action::Audit => self.audit.push(policy),
            Action::Custom(_) => self.custom.push(policy),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.custom.len() + self.deny.len() + self.allow.len() + self.audit.len()
    }
}

impl FromIterator<Arc<AuthorizationPolicy>> for PolicySelection {
    fn from_iter<T: IntoIterator<Item = Arc<AuthorizationPolicy>>>(iter: T) -> Self {
        let mut policies = iter.into_iter().collect::<Vec<_>>();
        policies.sort_by(|a, b| a.reference.cmp(&b.reference));

        let mut selection = Self::default();
        for policy in policies {
            selection.push(policy);
        }
        selection
    }
}
