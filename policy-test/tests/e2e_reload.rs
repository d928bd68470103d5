use mesh_authz_api::{request::Effect, FailStrategy};
use mesh_authz_core::{Effect as Verdict, RequestContext};
use mesh_authz_runtime::{Provider, Providers};
use mesh_authz_test::{allowed, denied, request, TestEngine};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::{sync::Arc, time::Duration};

/// Allows every request after a delay.
#[derive(Debug)]
struct Slow;

#[async_trait::async_trait]
impl Provider for Slow {
    async fn check(&self, _: &RequestContext) -> anyhow::Result<Verdict> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Verdict::Allow)
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn in_flight_requests_use_one_snapshot() {
    let mut providers = Providers::default();
    providers.insert("slow", Arc::new(Slow), Duration::from_secs(10), FailStrategy::FailClose);
    let test = TestEngine::with_providers(
        r#"
authorizationPolicies:
- metadata: {name: ext, namespace: foo}
  spec:
    action: CUSTOM
    provider: {name: slow}
    rules: [{}]
- metadata: {name: allow-admins, namespace: foo}
  spec:
    rules:
    - from: [{source: {principals: ["admin"]}}]
"#,
        providers,
    );
    let version = test.index().read().version();

    let mut in_flight = Box::pin(test.check(request("foo", &[], json!({"principal": "user"}))));
    assert!(
        futures::poll!(&mut in_flight).is_pending(),
        "the request must wait on the extension"
    );

    // Replace the policies while the request is waiting on its extension.
    test.reset("authorizationPolicies: []");
    assert_eq!(test.index().read().version(), version + 1);
    assert_eq!(
        test.check(request("foo", &[], json!({"principal": "user"})))
            .await,
        allowed(None)
    );

    assert_eq!(
        in_flight.await,
        denied(None),
        "the in-flight request completes against the prior snapshot"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn incremental_updates() {
    let test = TestEngine::new("authorizationPolicies: []");
    let req = || request("foo", &[], json!({"method": "DELETE"}));
    assert_eq!(test.effect(req()).await, Effect::Allow);

    test.index().write().apply(
        serde_json::from_value(json!({
            "metadata": {"name": "deny-delete", "namespace": "foo"},
            "spec": {
                "action": "DENY",
                "rules": [{"to": [{"operation": {"methods": ["DELETE"]}}]}],
            },
        }))
        .expect("policy must parse"),
    );
    assert_eq!(test.check(req()).await, denied(Some("foo/deny-delete")));

    test.index().write().delete("foo", "deny-delete");
    assert_eq!(test.effect(req()).await, Effect::Allow);
}
