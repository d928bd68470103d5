use crate::scope::Scope;
use anyhow::{bail, Context, Result};
use mesh_authz_api::policy::authorization_policy as api;
use mesh_authz_core::{
    authorization::{Condition, FieldMatch, Operation, PathMatch, Rule, Source},
    Action, AddressMatch, AuthorizationPolicy, PolicyRef, StringMatch,
};

/// An authorization policy as held by the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedPolicy {
    pub scope: Scope,
    pub policy: std::sync::Arc<AuthorizationPolicy>,
}

/// Converts an API resource into an indexed policy.
///
/// Invalid scopes and actions reject the whole policy. A rule that fails to
/// convert is dropped with a warning, so it never matches.
pub(crate) fn convert(
    policy: mesh_authz_api::AuthorizationPolicy,
    root_ns: &str,
) -> Result<IndexedPolicy> {
    let reference = PolicyRef::new(policy.metadata.namespace_or_default(), &policy.metadata.name);
    let spec = policy.spec;

    let scope = scope(&spec)?;
    if scope.is_cluster_scoped() && reference.namespace != root_ns {
        bail!("cluster-scoped targets are only supported in the root namespace {root_ns}");
    }

    let action = action(spec.action, spec.provider)?;

    let rules = spec
        .rules
        .into_iter()
        .enumerate()
        .filter_map(|(i, rule)| match self::rule(rule) {
            Ok(rule) => Some(rule),
            Err(error) => {
                tracing::warn!(policy = %reference, rule = i, error = %format!("{error:#}"), "Ignoring invalid rule");
                None
            }
        })
        .collect();

    Ok(IndexedPolicy {
        scope,
        policy: std::sync::Arc::new(AuthorizationPolicy {
            reference,
            action,
            rules,
        }),
    })
}

fn scope(spec: &api::AuthorizationPolicySpec) -> Result<Scope> {
    let targets = spec.all_target_refs().cloned().collect::<Vec<_>>();
    match (&spec.selector, targets.is_empty()) {
        (Some(_), false) => bail!("selector and targetRefs are mutually exclusive"),
        (Some(selector), true) => Ok(Scope::Selector(selector.clone())),
        (None, true) => Ok(Scope::Namespace),
        (None, false) => {
            if spec.target_ref.is_some() && !spec.target_refs.is_empty() {
                bail!("targetRef and targetRefs are mutually exclusive");
            }
            for target in &targets {
                if target.target_kind().is_none() {
                    bail!("unsupported target kind: {}", target.canonical_kind());
                }
            }
            Ok(Scope::TargetRefs(targets))
        }
    }
}

fn action(action: api::Action, provider: Option<api::ExtensionProviderRef>) -> Result<Action> {
    match (action, provider) {
        (api::Action::Custom, Some(provider)) => Ok(Action::Custom(provider.name)),
        (api::Action::Custom, None) => bail!("CUSTOM policies must name a provider"),
        (_, Some(_)) => bail!("only CUSTOM policies may name a provider"),
        (api::Action::Allow, None) => Ok(Action::Allow),
        (api::Action::Deny, None) => Ok(Action::Deny),
        (api::Action::Audit, None) => Ok(Action::Audit),
    }
}

fn rule(rule: api::Rule) -> Result<Rule> {
    let from = rule
        .from
        .into_iter()
        .map(|f| source(f.source).context("invalid source"))
        .collect::<Result<Vec<_>>>()?;
    let to = rule
        .to
        .into_iter()
        .map(|t| operation(t.operation).context("invalid operation"))
        .collect::<Result<Vec<_>>>()?;
    let when = rule
        .when
        .into_iter()
        .map(|c| Condition::new(&c.key, &c.values, &c.not_values))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid condition")?;
    Ok(Rule { from, to, when })
}

fn source(src: api::Source) -> Result<Source> {
    Ok(Source {
        principals: strings(&src.principals, &src.not_principals)?,
        request_principals: strings(&src.request_principals, &src.not_request_principals)?,
        namespaces: strings(&src.namespaces, &src.not_namespaces)?,
        service_accounts: strings(&src.service_accounts, &src.not_service_accounts)?,
        ip_blocks: addresses(&src.ip_blocks, &src.not_ip_blocks)?,
        remote_ip_blocks: addresses(&src.remote_ip_blocks, &src.not_remote_ip_blocks)?,
    })
}

fn operation(op: api::Operation) -> Result<Operation> {
    Ok(Operation {
        hosts: strings(&op.hosts, &op.not_hosts)?,
        ports: FieldMatch::parse(&op.ports, &op.not_ports, |p| {
            p.parse::<u16>()
                .with_context(|| format!("invalid port {p:?}"))
        })?,
        methods: strings(&op.methods, &op.not_methods)?,
        paths: FieldMatch::parse(&op.paths, &op.not_paths, PathMatch::parse)?,
    })
}

fn strings(values: &[String], not_values: &[String]) -> Result<FieldMatch<StringMatch>> {
    Ok(FieldMatch::parse(values, not_values, StringMatch::parse)?)
}

fn addresses(values: &[String], not_values: &[String]) -> Result<FieldMatch<AddressMatch>> {
    Ok(FieldMatch::parse(values, not_values, |v| {
        v.parse::<AddressMatch>()
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_authz_api::AuthorizationPolicy as ApiPolicy;
    use mesh_authz_core::RequestContext;

    fn parse(yaml: &str) -> ApiPolicy {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn converts_policy() {
        let indexed = convert(
            parse(
                r#"
metadata: {name: deny-admin, namespace: foo}
spec:
  selector:
    matchLabels: {app: httpbin}
  action: DENY
  rules:
  - to:
    - operation:
        ports: ["8000"]
        paths: ["/admin/{**}"]
"#,
            ),
            "istio-system",
        )
        .unwrap();

        assert!(matches!(indexed.scope, Scope::Selector(_)));
        let policy = &indexed.policy;
        assert_eq!(policy.reference, PolicyRef::new("foo", "deny-admin"));
        assert_eq!(policy.action, Action::Deny);
        assert_eq!(policy.rules.len(), 1);

        assert!(policy.matches(&RequestContext {
            port: Some(8000),
            path: Some("/admin/users".to_string()),
            ..Default::default()
        }));
        assert!(!policy.matches(&RequestContext {
            port: Some(8000),
            path: Some("/public".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn drops_invalid_rules() {
        let indexed = convert(
            parse(
                r#"
metadata: {name: mixed, namespace: foo}
spec:
  rules:
  - to:
    - operation:
        paths: ["/foo/{**}/{*}"]
  - from:
    - source:
        ipBlocks: ["10.0.0.0/40"]
  - to:
    - operation:
        ports: ["http"]
  - when:
    - key: request.headers[x]
  - from:
    - source:
        principals: ["*abc*"]
  - to:
    - operation:
        methods: ["GET"]
"#,
            ),
            "istio-system",
        )
        .unwrap();
        assert_eq!(indexed.policy.rules.len(), 1, "only the valid rule remains");
    }

    #[test]
    fn rejects_invalid_policies() {
        for (yaml, msg) in [
            (
                r#"
metadata: {name: p, namespace: foo}
spec:
  action: CUSTOM
"#,
                "custom without provider",
            ),
            (
                r#"
metadata: {name: p, namespace: foo}
spec:
  action: DENY
  provider: {name: ext}
"#,
                "provider without custom",
            ),
            (
                r#"
metadata: {name: p, namespace: foo}
spec:
  selector: {matchLabels: {app: a}}
  targetRefs:
  - {group: gateway.networking.k8s.io, kind: Gateway, name: gw}
"#,
                "selector and targetRefs",
            ),
            (
                r#"
metadata: {name: p, namespace: foo}
spec:
  targetRefs:
  - {group: apps, kind: Deployment, name: web}
"#,
                "unsupported kind",
            ),
            (
                r#"
metadata: {name: p, namespace: foo}
spec:
  targetRef: {group: gateway.networking.k8s.io, kind: GatewayClass, name: istio}
"#,
                "gateway class outside root namespace",
            ),
        ] {
            assert!(convert(parse(yaml), "istio-system").is_err(), "{msg}");
        }
    }

    #[test]
    fn custom_action_carries_provider() {
        let indexed = convert(
            parse(
                r#"
metadata: {name: ext, namespace: foo}
spec:
  action: CUSTOM
  provider: {name: ext-authz}
  rules: [{}]
"#,
            ),
            "istio-system",
        )
        .unwrap();
        assert_eq!(indexed.policy.action, Action::Custom("ext-authz".to_string()));
        assert_eq!(indexed.scope, Scope::Namespace);
    }
}
