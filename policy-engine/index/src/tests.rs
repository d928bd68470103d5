use super::*;
use mesh_authz_api::{Labels, ObjectRef};
use mesh_authz_core::{Action, PolicyRef};

const ROOT: &str = "istio-system";

fn mk_index() -> (Reader, SharedIndex) {
    Index::shared(
        ClusterInfo {
            root_namespace: ROOT.to_string(),
        },
        IndexMetrics::default(),
    )
}

fn mk_policy(yaml: &str) -> api::AuthorizationPolicy {
    serde_yaml::from_str(yaml).expect("policy must parse")
}

fn mk_workload(ns: &str, labels: &[(&'static str, &'static str)]) -> Workload {
    Workload::new(ns, labels.iter().copied().collect::<Labels>())
}

fn names(policies: &[Arc<mesh_authz_core::AuthorizationPolicy>]) -> Vec<String> {
    policies.iter().map(|p| p.reference.to_string()).collect()
}

#[test]
fn namespace_scoped_policies() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: allow-all, namespace: foo}
spec:
  rules: [{}]
"#,
    ));
    index.write().apply(mk_policy(
        r#"
metadata: {name: deny-ratings, namespace: foo}
spec:
  selector: {matchLabels: {app: ratings}}
  action: DENY
  rules: [{}]
"#,
    ));

    let ratings = reader.select(&mk_workload("foo", &[("app", "ratings")]));
    assert_eq!(names(&ratings.allow), vec!["foo/allow-all"]);
    assert_eq!(names(&ratings.deny), vec!["foo/deny-ratings"]);

    let reviews = reader.select(&mk_workload("foo", &[("app", "reviews")]));
    assert_eq!(names(&reviews.allow), vec!["foo/allow-all"]);
    assert!(reviews.deny.is_empty());

    let other = reader.select(&mk_workload("bar", &[("app", "ratings")]));
    assert!(other.is_empty(), "policies do not leak across namespaces");
}

#[test]
fn root_namespace_policies_apply_mesh_wide() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: audit-all, namespace: istio-system}
spec:
  action: AUDIT
  rules: [{}]
"#,
    ));
    index.write().apply(mk_policy(
        r#"
metadata: {name: gw, namespace: istio-system}
spec:
  targetRefs:
  - {group: gateway.networking.k8s.io, kind: Gateway, name: ingress}
  rules: [{}]
"#,
    ));

    let workload = mk_workload("foo", &[("app", "web")]).with_attachment(ObjectRef {
        group: "gateway.networking.k8s.io".to_string(),
        kind: "Gateway".to_string(),
        name: "ingress".to_string(),
        namespace: None,
    });
    let selection = reader.select(&workload);
    assert_eq!(names(&selection.audit), vec!["istio-system/audit-all"]);
    assert!(
        selection.allow.is_empty(),
        "namespaced targets in the root namespace do not apply mesh-wide"
    );
}

#[test]
fn selection_is_ordered() {
    let (reader, index) = mk_index();
    for (ns, name) in [("foo", "b"), (ROOT, "z"), ("foo", "a"), (ROOT, "a")] {
        index.write().apply(mk_policy(&format!(
            "metadata: {{name: {name}, namespace: {ns}}}\nspec: {{rules: [{{}}]}}\n"
        )));
    }
    let selection = reader.select(&mk_workload("foo", &[]));
    assert_eq!(
        names(&selection.allow),
        vec!["foo/a", "foo/b", "istio-system/a", "istio-system/z"]
    );
}

#[test]
fn delete_policy() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: p, namespace: foo}
spec: {rules: [{}]}
"#,
    ));
    assert_eq!(reader.snapshot().len(), 1);

    index.write().delete("foo", "p");
    assert!(reader.snapshot().is_empty());
    assert!(reader.select(&mk_workload("foo", &[])).is_empty());

    // Unknown policies are ignored without publishing.
    let version = reader.snapshot().version();
    index.write().delete("foo", "p");
    assert_eq!(reader.snapshot().version(), version);
}

#[test]
fn invalid_update_keeps_prior_policy() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: p, namespace: foo}
spec:
  action: DENY
  rules: [{}]
"#,
    ));
    let version = reader.snapshot().version();

    index.write().apply(mk_policy(
        r#"
metadata: {name: p, namespace: foo}
spec:
  action: CUSTOM
  rules: [{}]
"#,
    ));

    let snapshot = reader.snapshot();
    assert_eq!(snapshot.version(), version);
    let policy = snapshot.get("foo", "p").expect("policy must exist");
    assert_eq!(policy.policy.action, Action::Deny);
}

#[test]
fn reset_publishes_once() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: old, namespace: foo}
spec: {rules: [{}]}
"#,
    ));

    let before = reader.snapshot();
    index.write().reset(vec![
        mk_policy("metadata: {name: a, namespace: foo}\nspec: {rules: [{}]}\n"),
        mk_policy("metadata: {name: b, namespace: bar}\nspec: {action: DENY, rules: [{}]}\n"),
        mk_policy("metadata: {name: bad, namespace: bar}\nspec: {action: CUSTOM}\n"),
    ]);
    let after = reader.snapshot();

    assert_eq!(after.version(), before.version() + 1);
    assert_eq!(after.len(), 2);
    assert!(after.get("foo", "old").is_none());
    assert!(after.get("bar", "bad").is_none());

    // Snapshots held by in-flight evaluations are unaffected.
    assert_eq!(before.len(), 1);
    assert_eq!(
        names(&before.select(&mk_workload("foo", &[])).allow),
        vec!["foo/old"]
    );
    assert_eq!(
        after.get("bar", "b").map(|p| p.policy.reference.clone()),
        Some(PolicyRef::new("bar", "b"))
    );
}

#[test]
fn default_namespace() {
    let (reader, index) = mk_index();
    index.write().apply(mk_policy(
        r#"
metadata: {name: p}
spec: {rules: [{}]}
"#,
    ));
    assert_eq!(
        names(&reader.select(&mk_workload("default", &[])).allow),
        vec!["default/p"]
    );
}
