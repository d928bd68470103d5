use crate::{
    api::{self, ExtensionProviderKind, FailStrategy},
    core::{Effect, ExtensionAuthorizer, ExtensionError, RequestContext},
    metrics::DecisionMetrics,
};
use ahash::AHashMap as HashMap;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// An external authorizer invoked by CUSTOM policies.
#[async_trait::async_trait]
pub trait Provider: fmt::Debug + Send + Sync {
    async fn check(&self, ctx: &RequestContext) -> anyhow::Result<Effect>;
}

/// A provider that returns the same verdict for every request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StaticProvider {
    pub allow: bool,
}

/// Settings for providers that do not configure their own.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub timeout: Duration,
    pub fail_strategy: FailStrategy,
}

/// Holds the configured extension providers by name.
///
/// Every call is bounded by the provider's timeout. Failed calls are
/// resolved with the provider's fail strategy: fail-open calls are treated
/// as allowed, fail-reload calls are retried once, and everything else is
/// returned to the caller, which denies the request.
#[derive(Clone, Debug, Default)]
pub struct Providers {
    by_name: HashMap<String, Registered>,
    metrics: DecisionMetrics,
}

#[derive(Clone, Debug)]
struct Registered {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    fail_strategy: FailStrategy,
}

// === impl StaticProvider ===

#[async_trait::async_trait]
impl Provider for StaticProvider {
    async fn check(&self, _: &RequestContext) -> anyhow::Result<Effect> {
        Ok(if self.allow {
            Effect::Allow
        } else {
            Effect::Deny
        })
    }
}

// === impl ProviderDefaults ===

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(600),
            fail_strategy: FailStrategy::FailClose,
        }
    }
}

// === impl Providers ===

impl Providers {
    pub fn new(
        configs: &[api::ExtensionProvider],
        defaults: ProviderDefaults,
        metrics: DecisionMetrics,
    ) -> anyhow::Result<Self> {
        let mut providers = Self {
            by_name: HashMap::default(),
            metrics,
        };
        for config in configs {
            if providers.by_name.contains_key(&config.name) {
                anyhow::bail!("duplicate extension provider {:?}", config.name);
            }
            let provider: Arc<dyn Provider> = match config.kind {
                ExtensionProviderKind::Static { allow } => Arc::new(StaticProvider { allow }),
            };
            providers.insert(
                config.name.clone(),
                provider,
                config.timeout.map(Into::into).unwrap_or(defaults.timeout),
                config.fail_strategy.unwrap_or(defaults.fail_strategy),
            );
        }
        Ok(providers)
    }

    pub fn insert(
        &mut self,
        name: impl ToString,
        provider: Arc<dyn Provider>,
        timeout: Duration,
        fail_strategy: FailStrategy,
    ) {
        self.by_name.insert(
            name.to_string(),
            Registered {
                provider,
                timeout,
                fail_strategy,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    async fn call(
        &self,
        name: &str,
        registered: &Registered,
        ctx: &RequestContext,
    ) -> Result<Effect, ExtensionError> {
        let res = match tokio::time::timeout(registered.timeout, registered.provider.check(ctx))
            .await
        {
            Ok(Ok(effect)) => Ok(effect),
            Ok(Err(error)) => Err(ExtensionError::Failed {
                provider: name.to_string(),
                message: format!("{error:#}"),
            }),
            Err(_) => Err(ExtensionError::Timeout(name.to_string())),
        };
        if let Err(error) = &res {
            self.metrics.extension_error(error);
        }
        res
    }
}

#[async_trait::async_trait]
impl ExtensionAuthorizer for Providers {
    async fn check(&self, provider: &str, ctx: &RequestContext) -> Result<Effect, ExtensionError> {
        let Some(registered) = self.by_name.get(provider) else {
            let error = ExtensionError::Unknown(provider.to_string());
            self.metrics.extension_error(&error);
            return Err(error);
        };

        let error = match self.call(provider, registered, ctx).await {
            Ok(effect) => {
                debug!(%provider, %effect, "Extension responded");
                return Ok(effect);
            }
            Err(error) => error,
        };

        match registered.fail_strategy {
            FailStrategy::FailClose => Err(error),
            FailStrategy::FailOpen => {
                warn!(%provider, %error, "Extension failed; continuing evaluation");
                Ok(Effect::Allow)
            }
            FailStrategy::FailReload => {
                warn!(%provider, %error, "Extension failed; retrying");
                self.call(provider, registered, ctx).await
            }
        }
    }
}
