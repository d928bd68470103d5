use mesh_authz_api::{request::Effect, CheckRequest};
use mesh_authz_test::{denied, request, TestEngine};
use pretty_assertions::assert_eq;
use serde_json::json;

fn gateway_request(ns: &str, gateway: &str, gateway_ns: Option<&str>) -> CheckRequest {
    let mut attachment = json!({
        "group": "gateway.networking.k8s.io",
        "kind": "Gateway",
        "name": gateway,
    });
    if let Some(gateway_ns) = gateway_ns {
        attachment["namespace"] = json!(gateway_ns);
    }
    serde_json::from_value(json!({
        "workload": {
            "namespace": ns,
            "labels": {"app": "ingress"},
            "attachments": [attachment],
        },
        "request": {"path": "/"},
    }))
    .expect("request must be valid")
}

#[tokio::test(flavor = "current_thread")]
async fn root_namespace_policies_apply_everywhere() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: deny-legacy, namespace: istio-system}
  spec:
    selector: {matchLabels: {version: legacy}}
    action: DENY
    rules: [{}]
- metadata: {name: deny-legacy, namespace: other}
  spec:
    action: DENY
    rules: [{}]
"#,
    );

    for ns in ["foo", "bar", "istio-system"] {
        assert_eq!(
            test.check(request(ns, &[("version", "legacy")], json!({})))
                .await,
            denied(Some("istio-system/deny-legacy")),
            "{ns}"
        );
        assert_eq!(
            test.effect(request(ns, &[("version", "v2")], json!({})))
                .await,
            Effect::Allow,
            "{ns}"
        );
    }
}

#[tokio::test(flavor = "current_thread")]
async fn target_refs() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: gw-deny, namespace: ingress}
  spec:
    targetRefs:
    - {group: gateway.networking.k8s.io, kind: Gateway, name: public}
    action: DENY
    rules:
    - to: [{operation: {paths: ["/"]}}]
- metadata: {name: root-gw-deny, namespace: istio-system}
  spec:
    targetRef: {group: gateway.networking.k8s.io, kind: Gateway, name: internal}
    action: DENY
    rules: [{}]
"#,
    );

    assert_eq!(
        test.check(gateway_request("ingress", "public", None)).await,
        denied(Some("ingress/gw-deny"))
    );
    assert_eq!(
        test.effect(gateway_request("ingress", "private", None)).await,
        Effect::Allow,
        "other gateways are not targeted"
    );
    assert_eq!(
        test.effect(gateway_request("other", "public", None)).await,
        Effect::Allow,
        "gateways in other namespaces are not targeted"
    );
    assert_eq!(
        test.effect(gateway_request("ingress", "internal", None)).await,
        Effect::Allow,
        "namespaced targets in the root namespace do not apply mesh-wide"
    );
    assert_eq!(
        test.effect(gateway_request("ingress", "internal", Some("istio-system")))
            .await,
        Effect::Deny
    );
}

#[tokio::test(flavor = "current_thread")]
async fn gateway_classes() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: class-deny, namespace: istio-system}
  spec:
    targetRef: {group: gateway.networking.k8s.io, kind: GatewayClass, name: istio}
    action: DENY
    rules: [{}]
- metadata: {name: class-deny, namespace: foo}
  spec:
    targetRef: {group: gateway.networking.k8s.io, kind: GatewayClass, name: waypoint}
    action: DENY
    rules: [{}]
"#,
    );

    let class_request = |class: &str| -> CheckRequest {
        serde_json::from_value(json!({
            "workload": {
                "namespace": "foo",
                "attachments": [{
                    "group": "gateway.networking.k8s.io",
                    "kind": "GatewayClass",
                    "name": class,
                }],
            },
        }))
        .expect("request must be valid")
    };

    assert_eq!(
        test.check(class_request("istio")).await,
        denied(Some("istio-system/class-deny"))
    );
    assert_eq!(
        test.effect(class_request("waypoint")).await,
        Effect::Allow,
        "GatewayClass targets outside the root namespace are rejected"
    );
}
