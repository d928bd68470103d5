use crate::{
    api::policy::{
        authorization_policy::{Action, Condition, Operation, Rule, Source},
        AuthorizationPolicy, TargetKind,
    },
    core::{authorization::PathMatch, request::AttributeKey, AddressMatch, StringMatch},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("policy name must not be empty")]
    MissingName,

    /// A policy may select workloads by label or by target reference.
    #[error("only one of selector, targetRef, or targetRefs may be set")]
    MultipleSelectionModes,

    #[error("unsupported target kind {0}")]
    UnsupportedTarget(String),

    #[error("cross-namespace target references are not supported: {0}")]
    CrossNamespaceTarget(String),

    #[error("{kind} targets may only be used in the root namespace {root}")]
    ClusterScopedTarget { kind: String, root: String },

    #[error("CUSTOM policies must name a provider")]
    MissingProvider,

    #[error("only CUSTOM policies may name a provider")]
    UnexpectedProvider,

    #[error("rule {rule}: serviceAccounts cannot be combined with principals or namespaces")]
    ServiceAccountConflict { rule: usize },

    #[error("rule {rule}: condition {key:?} must set values or notValues")]
    EmptyCondition { rule: usize, key: String },

    #[error("rule {rule}: invalid {field} {value:?}: {reason}")]
    InvalidValue {
        rule: usize,
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Checks a policy before it is admitted to the index.
pub fn validate_policy(policy: &AuthorizationPolicy, root_ns: &str) -> Result<(), Error> {
    if policy.metadata.name.is_empty() {
        return Err(Error::MissingName);
    }
    let namespace = policy.metadata.namespace_or_default();
    let spec = &policy.spec;

    let modes = [
        spec.selector.is_some(),
        spec.target_ref.is_some(),
        !spec.target_refs.is_empty(),
    ];
    if modes.into_iter().filter(|set| *set).count() > 1 {
        return Err(Error::MultipleSelectionModes);
    }

    for target in spec.all_target_refs() {
        let Some(kind) = target.target_kind() else {
            return Err(Error::UnsupportedTarget(target.canonical_kind()));
        };
        if target.namespace.as_deref().is_some_and(|ns| ns != namespace) {
            return Err(Error::CrossNamespaceTarget(format!(
                "{}/{}",
                target.canonical_kind(),
                target.name
            )));
        }
        if kind == TargetKind::GatewayClass && namespace != root_ns {
            return Err(Error::ClusterScopedTarget {
                kind: target.canonical_kind(),
                root: root_ns.to_string(),
            });
        }
    }

    match (spec.action, &spec.provider) {
        (Action::Custom, None) => return Err(Error::MissingProvider),
        (Action::Allow | Action::Deny | Action::Audit, Some(_)) => {
            return Err(Error::UnexpectedProvider)
        }
        _ => {}
    }

    for (i, rule) in spec.rules.iter().enumerate() {
        validate_rule(i, rule)?;
    }

    Ok(())
}

fn validate_rule(rule: usize, Rule { from, to, when }: &Rule) -> Result<(), Error> {
    for from in from {
        validate_source(rule, &from.source)?;
    }
    for to in to {
        validate_operation(rule, &to.operation)?;
    }
    for condition in when {
        validate_condition(rule, condition)?;
    }
    Ok(())
}

fn validate_source(rule: usize, src: &Source) -> Result<(), Error> {
    let has_service_accounts = !src.service_accounts.is_empty() || !src.not_service_accounts.is_empty();
    let has_identities = !src.principals.is_empty()
        || !src.not_principals.is_empty()
        || !src.namespaces.is_empty()
        || !src.not_namespaces.is_empty();
    if has_service_accounts && has_identities {
        return Err(Error::ServiceAccountConflict { rule });
    }

    check(rule, "principal", &src.principals, pattern)?;
    check(rule, "principal", &src.not_principals, pattern)?;
    check(rule, "request principal", &src.request_principals, pattern)?;
    check(rule, "request principal", &src.not_request_principals, pattern)?;
    check(rule, "namespace", &src.namespaces, pattern)?;
    check(rule, "namespace", &src.not_namespaces, pattern)?;
    check(rule, "service account", &src.service_accounts, service_account)?;
    check(rule, "service account", &src.not_service_accounts, service_account)?;
    check(rule, "IP block", &src.ip_blocks, address)?;
    check(rule, "IP block", &src.not_ip_blocks, address)?;
    check(rule, "remote IP block", &src.remote_ip_blocks, address)?;
    check(rule, "remote IP block", &src.not_remote_ip_blocks, address)?;
    Ok(())
}

fn validate_operation(rule: usize, op: &Operation) -> Result<(), Error> {
    check(rule, "host", &op.hosts, pattern)?;
    check(rule, "host", &op.not_hosts, pattern)?;
    check(rule, "port", &op.ports, port)?;
    check(rule, "port", &op.not_ports, port)?;
    check(rule, "method", &op.methods, pattern)?;
    check(rule, "method", &op.not_methods, pattern)?;
    check(rule, "path", &op.paths, path)?;
    check(rule, "path", &op.not_paths, path)?;
    Ok(())
}

fn validate_condition(rule: usize, condition: &Condition) -> Result<(), Error> {
    let key = AttributeKey::parse(&condition.key);
    match &key {
        AttributeKey::Other(k) if k.is_empty() => {
            return Err(Error::InvalidValue {
                rule,
                field: "condition key",
                value: condition.key.clone(),
                reason: "must not be empty".to_string(),
            })
        }
        AttributeKey::Header(name) if name.is_empty() => {
            return Err(Error::InvalidValue {
                rule,
                field: "condition key",
                value: condition.key.clone(),
                reason: "header name must not be empty".to_string(),
            })
        }
        _ => {}
    }

    if condition.values.is_empty() && condition.not_values.is_empty() {
        return Err(Error::EmptyCondition {
            rule,
            key: condition.key.clone(),
        });
    }

    let parse: fn(&str) -> Result<(), String> = match key {
        k if k.is_address() => address,
        AttributeKey::DestinationPort => port,
        _ => pattern,
    };
    check(rule, "condition value", &condition.values, parse)?;
    check(rule, "condition value", &condition.not_values, parse)?;
    Ok(())
}

fn check(
    rule: usize,
    field: &'static str,
    values: &[String],
    parse: fn(&str) -> Result<(), String>,
) -> Result<(), Error> {
    for value in values {
        parse(value).map_err(|reason| Error::InvalidValue {
            rule,
            field,
            value: value.clone(),
            reason,
        })?;
    }
    Ok(())
}

fn pattern(v: &str) -> Result<(), String> {
    StringMatch::parse(v).map(|_| ()).map_err(|e| e.to_string())
}

fn address(v: &str) -> Result<(), String> {
    v.parse::<AddressMatch>().map(|_| ()).map_err(|e| e.to_string())
}

fn port(v: &str) -> Result<(), String> {
    v.parse::<u16>().map(|_| ()).map_err(|e| e.to_string())
}

fn path(v: &str) -> Result<(), String> {
    PathMatch::parse(v).map(|_| ()).map_err(|e| e.to_string())
}

fn service_account(v: &str) -> Result<(), String> {
    match v.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            pattern(v)
        }
        _ => Err("must have the form <namespace>/<name>".to_string()),
    }
}
