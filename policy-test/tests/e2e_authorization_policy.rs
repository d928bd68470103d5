use mesh_authz_api::request::Effect;
use mesh_authz_test::{allowed, denied, request, TestEngine};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test(flavor = "current_thread")]
async fn no_policies_allow() {
    let test = TestEngine::new("authorizationPolicies: []");
    assert_eq!(
        test.check(request("default", &[], json!({}))).await,
        allowed(None)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn deny_precedes_allow() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: allow-all, namespace: foo}
  spec:
    rules: [{}]
- metadata: {name: deny-delete, namespace: foo}
  spec:
    action: DENY
    rules:
    - to: [{operation: {methods: [DELETE]}}]
"#,
    );

    assert_eq!(
        test.check(request("foo", &[], json!({"method": "GET"})))
            .await,
        allowed(Some("foo/allow-all"))
    );
    assert_eq!(
        test.check(request("foo", &[], json!({"method": "DELETE"})))
            .await,
        denied(Some("foo/deny-delete"))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn allow_policies_deny_unmatched_requests() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: allow-nothing, namespace: foo}
  spec:
    rules:
    - to: [{operation: {paths: ["/never"]}}]
"#,
    );
    assert_eq!(
        test.check(request("foo", &[], json!({"path": "/"}))).await,
        denied(None)
    );

    // A policy without rules matches nothing but still denies by default.
    test.reset(
        r#"
authorizationPolicies:
- metadata: {name: allow-nothing, namespace: foo}
"#,
    );
    assert_eq!(
        test.check(request("foo", &[], json!({"path": "/"}))).await,
        denied(None)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn selectors() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: ratings, namespace: bookinfo}
  spec:
    selector: {matchLabels: {app: ratings}}
    action: DENY
    rules: [{}]
- metadata: {name: ratings-prod, namespace: bookinfo}
  spec:
    selector: {matchLabels: {app: ratings, env: prod}}
    action: DENY
    rules: [{}]
"#,
    );

    assert_eq!(
        test.check(request("bookinfo", &[("app", "ratings")], json!({})))
            .await,
        denied(Some("bookinfo/ratings"))
    );
    assert_eq!(
        test.effect(request("bookinfo", &[("app", "reviews")], json!({})))
            .await,
        Effect::Allow
    );

    test.reset(
        r#"
authorizationPolicies:
- metadata: {name: ratings-prod, namespace: bookinfo}
  spec:
    selector: {matchLabels: {app: ratings, env: prod}}
    action: DENY
    rules: [{}]
"#,
    );
    assert_eq!(
        test.effect(request("bookinfo", &[("app", "ratings")], json!({})))
            .await,
        Effect::Allow,
        "all selector labels must match"
    );
    assert_eq!(
        test.effect(request(
            "bookinfo",
            &[("app", "ratings"), ("env", "prod"), ("version", "v1")],
            json!({})
        ))
        .await,
        Effect::Deny
    );
}

#[tokio::test(flavor = "current_thread")]
async fn sources() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: allow-sleep, namespace: foo}
  spec:
    rules:
    - from:
      - source:
          principals: ["cluster.local/ns/foo/sa/sleep"]
      - source:
          serviceAccounts: ["bar/curl"]
      - source:
          ipBlocks: ["203.0.113.0/24"]
          notIpBlocks: ["203.0.113.128/25"]
      - source:
          requestPrincipals: ["https://issuer.example/*"]
"#,
    );

    for (req, expected, msg) in [
        (
            json!({"principal": "cluster.local/ns/foo/sa/sleep"}),
            Effect::Allow,
            "principal",
        ),
        (
            json!({"principal": "spiffe://cluster.local/ns/bar/sa/curl"}),
            Effect::Allow,
            "service account",
        ),
        (
            json!({"principal": "cluster.local/ns/bar/sa/other"}),
            Effect::Deny,
            "other service account",
        ),
        (json!({"sourceIp": "203.0.113.4"}), Effect::Allow, "in block"),
        (
            json!({"sourceIp": "203.0.113.200"}),
            Effect::Deny,
            "excluded from block",
        ),
        (json!({"sourceIp": "203.0.114.4"}), Effect::Deny, "outside block"),
        (json!({"sourceIp": "2001:db8::1"}), Effect::Deny, "other family"),
        (
            json!({"requestPrincipal": "https://issuer.example/alice"}),
            Effect::Allow,
            "request principal",
        ),
        (json!({}), Effect::Deny, "unauthenticated"),
    ] {
        assert_eq!(test.effect(request("foo", &[], req)).await, expected, "{msg}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn operations() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: api, namespace: foo}
  spec:
    rules:
    - to:
      - operation:
          hosts: ["*.example.com"]
          ports: ["8080"]
          methods: ["GET", "POST"]
          paths: ["/api/{*}/items", "/static/{**}"]
          notPaths: ["/static/private/{**}"]
"#,
    );

    let base = json!({"host": "API.example.com", "port": 8080, "method": "get"});
    for (path, expected) in [
        ("/api/v1/items", Effect::Allow),
        ("/api/v1/items?page=2", Effect::Allow),
        ("/api/v1/v2/items", Effect::Deny),
        ("/api//items", Effect::Deny),
        ("/static", Effect::Allow),
        ("/static/css/site.css", Effect::Allow),
        ("/static/private/key", Effect::Deny),
        ("/other", Effect::Deny),
    ] {
        let mut req = base.clone();
        req["path"] = json!(path);
        assert_eq!(test.effect(request("foo", &[], req)).await, expected, "{path}");
    }

    for (field, value) in [
        ("host", json!("example.org")),
        ("port", json!(9090)),
        ("method", json!("DELETE")),
    ] {
        let mut req = base.clone();
        req["path"] = json!("/api/v1/items");
        req[field] = value;
        assert_eq!(
            test.effect(request("foo", &[], req)).await,
            Effect::Deny,
            "{field}"
        );
    }
}

#[tokio::test(flavor = "current_thread")]
async fn conditions() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: claims, namespace: foo}
  spec:
    rules:
    - when:
      - key: request.auth.claims[groups]
        values: ["admins"]
      - key: request.headers[X-Env]
        notValues: ["prod*"]
      - key: remote.ip
        values: ["192.0.2.0/24"]
"#,
    );

    let ok = json!({
        "remoteIp": "192.0.2.10",
        "headers": {"x-env": "staging"},
        "attributes": {"request.auth.claims[groups]": ["users", "admins"]},
    });
    assert_eq!(test.effect(request("foo", &[], ok.clone())).await, Effect::Allow);

    let mut prod = ok.clone();
    prod["headers"] = json!({"X-Env": "production"});
    assert_eq!(test.effect(request("foo", &[], prod)).await, Effect::Deny);

    let mut no_claims = ok.clone();
    no_claims["attributes"] = json!({});
    assert_eq!(test.effect(request("foo", &[], no_claims)).await, Effect::Deny);

    let mut no_header = ok.clone();
    no_header["headers"] = json!({});
    assert_eq!(
        test.effect(request("foo", &[], no_header)).await,
        Effect::Allow,
        "an absent header does not match a negated pattern"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn header_casing_does_not_bypass_deny() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: deny-prod, namespace: foo}
  spec:
    action: DENY
    rules:
    - when:
      - key: request.headers[x-env]
        values: ["prod"]
"#,
    );

    assert_eq!(
        test.check(request("foo", &[], json!({"headers": {"x-env": "dev"}})))
            .await,
        allowed(None)
    );
    assert_eq!(
        test.check(request(
            "foo",
            &[],
            json!({"headers": {"X-Env": "prod", "x-env": "dev"}})
        ))
        .await,
        denied(Some("foo/deny-prod"))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_policies_are_skipped() {
    let test = TestEngine::new(
        r#"
authorizationPolicies:
- metadata: {name: broken, namespace: foo}
  spec:
    action: DENY
    rules:
    - from: [{source: {principals: ["*bad*"]}}]
- metadata: {name: deny-post, namespace: foo}
  spec:
    action: DENY
    rules:
    - to: [{operation: {methods: [POST]}}]
"#,
    );

    assert_eq!(
        test.check(request("foo", &[], json!({"method": "GET"})))
            .await,
        allowed(None)
    );
    assert_eq!(
        test.check(request("foo", &[], json!({"method": "POST"})))
            .await,
        denied(Some("foo/deny-post"))
    );
}
