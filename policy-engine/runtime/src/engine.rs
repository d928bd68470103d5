use crate::{
    api::{
        request::{Effect as ApiEffect, RequestAttributes},
        CheckRequest, CheckResponse,
    },
    core::{decide, Decision, Effect, ExtensionAuthorizer, RequestContext},
    index::{Reader, Workload},
    metrics::DecisionMetrics,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Evaluates requests against the current policy snapshot.
#[derive(Clone)]
pub struct Engine {
    reader: Reader,
    extensions: Arc<dyn ExtensionAuthorizer + Send + Sync>,
    metrics: DecisionMetrics,
}

impl Engine {
    pub fn new(
        reader: Reader,
        extensions: Arc<dyn ExtensionAuthorizer + Send + Sync>,
        metrics: DecisionMetrics,
    ) -> Self {
        Self {
            reader,
            extensions,
            metrics,
        }
    }

    /// Decides a single request.
    ///
    /// The snapshot is read once, so a concurrent reload never affects a
    /// request that is already being evaluated. Extension failures that
    /// reach this point are resolved by denying the request.
    pub async fn check(&self, CheckRequest { workload, request }: CheckRequest) -> CheckResponse {
        let snapshot = self.reader.snapshot();
        let workload = Workload::from(workload);
        let ctx = request_context(request);

        let selection = snapshot.select(&workload);
        let (decision, extension_error) =
            match decide(&selection, &ctx, &*self.extensions).await {
                Ok(decision) => (decision, None),
                Err(failure) => {
                    warn!(policy = %failure.policy, error = %failure.error, "Extension failed; denying request");
                    (failure.fail_closed(), Some(failure.error.to_string()))
                }
            };

        debug!(
            namespace = %workload.namespace,
            version = snapshot.version(),
            effect = %decision.effect,
            audit = decision.audit,
            policy = ?decision.policy.as_ref().map(ToString::to_string),
            "Decided request"
        );
        self.metrics.decision(&decision);
        response(decision, extension_error)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

fn response(decision: Decision, extension_error: Option<String>) -> CheckResponse {
    CheckResponse {
        effect: match decision.effect {
            Effect::Allow => ApiEffect::Allow,
            Effect::Deny => ApiEffect::Deny,
        },
        audit: decision.audit,
        policy: decision.policy.map(|p| p.to_string()),
        extension_error,
    }
}

pub(crate) fn request_context(attrs: RequestAttributes) -> RequestContext {
    // Header names are case-insensitive, so values sent under different
    // casings of the same name are merged.
    let mut headers = ahash::AHashMap::<String, Vec<String>>::default();
    for (name, values) in attrs.headers {
        headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(values.into_vec());
    }

    RequestContext {
        principal: attrs.principal,
        request_principal: attrs.request_principal,
        namespace: attrs.namespace,
        source_ip: attrs.source_ip,
        remote_ip: attrs.remote_ip,
        destination_ip: attrs.destination_ip,
        host: attrs.host,
        port: attrs.port,
        method: attrs.method,
        path: attrs.path,
        sni: attrs.sni,
        audiences: attrs.audiences,
        presenter: attrs.presenter,
        headers,
        attributes: attrs
            .attributes
            .into_iter()
            .map(|(k, v)| (k, v.into_vec()))
            .collect(),
    }
}
