//! Matching for the `from`, `to` and `when` clauses of authorization rules.

use crate::{
    request::{AttributeKey, RequestContext},
    AddressMatch, Case, InvalidAddress, InvalidPattern, InvalidTemplate, PathTemplate,
    StringMatch,
};
use std::net::IpAddr;

/// A positive and a negated list of matchers for one request attribute.
///
/// The field passes when the value matches any positive matcher (or there are
/// none) and matches no negated matcher. An empty field imposes no
/// constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMatch<M> {
    pub values: Vec<M>,
    pub not_values: Vec<M>,
}

/// Matches a request's source identity and addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Source {
    pub principals: FieldMatch<StringMatch>,
    pub request_principals: FieldMatch<StringMatch>,
    pub namespaces: FieldMatch<StringMatch>,
    pub service_accounts: FieldMatch<StringMatch>,
    pub ip_blocks: FieldMatch<AddressMatch>,
    pub remote_ip_blocks: FieldMatch<AddressMatch>,
}

/// Matches the operation a request performs on the destination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Operation {
    /// Compared case-insensitively.
    pub hosts: FieldMatch<StringMatch>,
    pub ports: FieldMatch<u16>,
    /// Compared case-insensitively.
    pub methods: FieldMatch<StringMatch>,
    pub paths: FieldMatch<PathMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathMatch {
    Pattern(StringMatch),
    Template(PathTemplate),
}

/// Matches an arbitrary request attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub key: AttributeKey,
    pub values: ConditionValues,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionValues {
    Addresses(FieldMatch<AddressMatch>),
    Strings(FieldMatch<StringMatch>),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCondition {
    #[error("condition {0:?} must set values or notValues")]
    Empty(String),

    #[error(transparent)]
    Pattern(#[from] InvalidPattern),

    #[error(transparent)]
    Address(#[from] InvalidAddress),
}

/// A single authorization rule. Any `from` entry and any `to` entry must
/// match, as must every `when` condition. An empty rule matches every
/// request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    pub from: Vec<Source>,
    pub to: Vec<Operation>,
    pub when: Vec<Condition>,
}

// === impl FieldMatch ===

impl<M> Default for FieldMatch<M> {
    fn default() -> Self {
        Self {
            values: vec![],
            not_values: vec![],
        }
    }
}

impl<M> FieldMatch<M> {
    pub fn new(values: Vec<M>, not_values: Vec<M>) -> Self {
        Self { values, not_values }
    }

    /// Builds a field from unparsed lists, failing on the first invalid entry.
    pub fn parse<S, E>(
        values: &[S],
        not_values: &[S],
        parse: impl Fn(&str) -> Result<M, E>,
    ) -> Result<Self, E>
    where
        S: AsRef<str>,
    {
        let values = values
            .iter()
            .map(|v| parse(v.as_ref()))
            .collect::<Result<Vec<_>, E>>()?;
        let not_values = not_values
            .iter()
            .map(|v| parse(v.as_ref()))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { values, not_values })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.not_values.is_empty()
    }

    /// Evaluates the field with `is_match` deciding whether a single matcher
    /// accepts the request's value.
    pub fn matches(&self, is_match: impl Fn(&M) -> bool) -> bool {
        (self.values.is_empty() || self.values.iter().any(&is_match))
            && (self.not_values.is_empty() || !self.not_values.iter().any(&is_match))
    }
}

impl FieldMatch<StringMatch> {
    fn matches_str(&self, value: Option<&str>, case: Case) -> bool {
        let value = value.unwrap_or_default();
        self.matches(|m| m.matches_with(value, case))
    }
}

impl FieldMatch<AddressMatch> {
    fn matches_addr(&self, addr: Option<IpAddr>) -> bool {
        self.matches(|m| addr.map(|a| m.contains(&a)).unwrap_or(false))
    }
}

// === impl Source ===

impl Source {
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.principals
            .matches_str(ctx.principal.as_deref(), Case::Sensitive)
            && self
                .request_principals
                .matches_str(ctx.request_principal.as_deref(), Case::Sensitive)
            && self
                .namespaces
                .matches_str(ctx.namespace.as_deref(), Case::Sensitive)
            && (self.service_accounts.is_empty()
                || self
                    .service_accounts
                    .matches_str(ctx.service_account().as_deref(), Case::Sensitive))
            && self.ip_blocks.matches_addr(ctx.source_ip)
            && self.remote_ip_blocks.matches_addr(ctx.remote_ip)
    }
}

// === impl Operation ===

impl Operation {
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.hosts
            .matches_str(ctx.host.as_deref(), Case::Insensitive)
            && self.ports.matches(|p| ctx.port == Some(*p))
            && self
                .methods
                .matches_str(ctx.method.as_deref(), Case::Insensitive)
            && self.paths.matches(|m| m.matches(ctx.path_only()))
    }
}

// === impl PathMatch ===

impl PathMatch {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if PathTemplate::is_template(path) {
            return Ok(Self::Template(PathTemplate::parse(path)?));
        }
        Ok(Self::Pattern(StringMatch::parse(path)?))
    }

    pub fn matches(&self, path: Option<&str>) -> bool {
        let path = path.unwrap_or_default();
        match self {
            Self::Pattern(m) => m.matches(path),
            Self::Template(t) => t.matches(path),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error(transparent)]
    Pattern(#[from] InvalidPattern),

    #[error(transparent)]
    Template(#[from] InvalidTemplate),
}

// === impl Condition ===

impl Condition {
    pub fn new<S: AsRef<str>>(
        key: &str,
        values: &[S],
        not_values: &[S],
    ) -> Result<Self, InvalidCondition> {
        if values.is_empty() && not_values.is_empty() {
            return Err(InvalidCondition::Empty(key.to_string()));
        }

        let key = AttributeKey::parse(key);
        let values = if key.is_address() {
            ConditionValues::Addresses(FieldMatch::parse(values, not_values, |v| {
                v.parse::<AddressMatch>()
            })?)
        } else {
            ConditionValues::Strings(FieldMatch::parse(values, not_values, StringMatch::parse)?)
        };
        Ok(Self { key, values })
    }

    /// Matches if any of the attribute's values satisfies the condition. An
    /// absent attribute is evaluated as a single empty value.
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        match &self.values {
            ConditionValues::Addresses(field) => field.matches_addr(ctx.address(&self.key)),
            ConditionValues::Strings(field) => {
                let values = ctx.values(&self.key);
                if values.is_empty() {
                    return field.matches_str(None, Case::Sensitive);
                }
                values
                    .iter()
                    .any(|v| field.matches_str(Some(v.as_str()), Case::Sensitive))
            }
        }
    }
}

// === impl Rule ===

impl Rule {
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        (self.from.is_empty() || self.from.iter().any(|s| s.matches(ctx)))
            && (self.to.is_empty() || self.to.iter().any(|o| o.matches(ctx)))
            && self.when.iter().all(|c| c.matches(ctx))
    }
}
