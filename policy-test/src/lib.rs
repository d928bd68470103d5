//! Helpers for exercising the authorization engine end-to-end.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod admission;

use mesh_authz_api::{request::Effect, CheckRequest, CheckResponse, PolicyBundle};
use mesh_authz_index::{ClusterInfo, Index, IndexMetrics, SharedIndex};
use mesh_authz_runtime::{DecisionMetrics, Engine, ProviderDefaults, Providers};
use std::sync::Arc;

pub const ROOT_NS: &str = "istio-system";

/// An engine backed by an in-memory index.
pub struct TestEngine {
    engine: Engine,
    index: SharedIndex,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl TestEngine {
    /// Builds an engine from a YAML bundle, including its extension
    /// providers.
    pub fn new(bundle: &str) -> Self {
        let PolicyBundle {
            extension_providers,
            ..
        } = parse_bundle(bundle);
        let providers = Providers::new(
            &extension_providers,
            ProviderDefaults::default(),
            DecisionMetrics::default(),
        )
        .expect("providers must be valid");
        Self::with_providers(bundle, providers)
    }

    pub fn with_providers(bundle: &str, providers: Providers) -> Self {
        let _tracing = init_tracing();
        let (reader, index) = Index::shared(
            ClusterInfo {
                root_namespace: ROOT_NS.to_string(),
            },
            IndexMetrics::default(),
        );
        let engine = Engine::new(reader, Arc::new(providers), DecisionMetrics::default());
        let engine = Self {
            engine,
            index,
            _tracing,
        };
        engine.reset(bundle);
        engine
    }

    /// Replaces all policies with those in `bundle`, applying the same
    /// validation as the runtime.
    pub fn reset(&self, bundle: &str) {
        let policies = mesh_authz_runtime::bundle::admit(
            parse_bundle(bundle).authorization_policies,
            ROOT_NS,
        );
        self.index.write().reset(policies);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub async fn check(&self, req: CheckRequest) -> CheckResponse {
        let rsp = self.engine.check(req.clone()).await;
        tracing::debug!(?req, ?rsp, "Checked");
        rsp
    }

    /// Checks a request and returns only its effect.
    pub async fn effect(&self, req: CheckRequest) -> Effect {
        self.check(req).await.effect
    }
}

/// Builds a request to a workload in `ns` with the given labels. `request`
/// holds the request attributes in their JSON form.
pub fn request(
    ns: &str,
    labels: &[(&str, &str)],
    request: serde_json::Value,
) -> CheckRequest {
    let labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::from_value(serde_json::json!({
        "workload": { "namespace": ns, "labels": labels },
        "request": request,
    }))
    .expect("request must be valid")
}

pub fn allowed(policy: Option<&str>) -> CheckResponse {
    response(Effect::Allow, false, policy)
}

pub fn denied(policy: Option<&str>) -> CheckResponse {
    response(Effect::Deny, false, policy)
}

pub fn response(effect: Effect, audit: bool, policy: Option<&str>) -> CheckResponse {
    CheckResponse {
        effect,
        audit,
        policy: policy.map(ToString::to_string),
        extension_error: None,
    }
}

fn parse_bundle(bundle: &str) -> PolicyBundle {
    PolicyBundle::from_yaml(bundle).expect("bundle must parse")
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "mesh_authz=trace,debug".parse().unwrap()),
            )
            .finish(),
    )
}
