use crate::{
    api::{FailStrategy, PolicyBundle},
    bundle::{self, load_bundle},
    engine::Engine,
    extension::{ProviderDefaults, Providers},
    index::{ClusterInfo, Index, IndexMetrics, SharedIndex},
    log::{LogFilter, LogFormat},
    metrics::DecisionMetrics,
    serve::serve,
};
use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{path::PathBuf, sync::Arc};
use tokio::time::{self, Duration};
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "mesh-authz",
    about = "Evaluates mesh authorization policies for requests read from stdin"
)]
pub struct Args {
    #[clap(long, default_value = "mesh_authz=info,warn", env = "MESH_AUTHZ_LOG")]
    log_level: LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: LogFormat,

    /// A YAML or JSON policy bundle.
    #[clap(long, env = "MESH_AUTHZ_POLICIES", required_unless_present = "print_schema")]
    policies: Option<PathBuf>,

    /// The namespace whose policies apply to all workloads.
    #[clap(long, default_value = "istio-system")]
    root_namespace: String,

    /// Bounds calls to extension providers that do not set a timeout.
    #[clap(long, default_value = "600")]
    extension_timeout_ms: u64,

    /// Resolves failed calls to extension providers that do not set a
    /// strategy.
    #[clap(long, default_value = "fail-close")]
    fail_strategy: FailStrategy,

    /// Periodically reloads policies from the bundle. Extension providers
    /// are only loaded at startup.
    #[clap(long)]
    reload_interval_secs: Option<u64>,

    /// Writes metrics to stderr on exit.
    #[clap(long)]
    metrics: bool,

    /// Prints the bundle's JSON schema and exits.
    #[clap(long)]
    print_schema: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            policies,
            root_namespace,
            extension_timeout_ms,
            fail_strategy,
            reload_interval_secs,
            metrics,
            print_schema,
        } = self;

        if print_schema {
            println!("{}", bundle_schema()?);
            return Ok(());
        }

        log_format.try_init(&log_level)?;

        let path = policies.context("--policies must be set")?;

        let mut prom = <Registry>::default();
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("index"));
        let decision_metrics = DecisionMetrics::register(prom.sub_registry_with_prefix("authz"));

        let (reader, index) = Index::shared(
            ClusterInfo {
                root_namespace: root_namespace.clone(),
            },
            index_metrics,
        );

        let PolicyBundle {
            extension_providers,
            authorization_policies,
        } = load_bundle(&path).await?;
        let providers = Providers::new(
            &extension_providers,
            ProviderDefaults {
                timeout: Duration::from_millis(extension_timeout_ms),
                fail_strategy,
            },
            decision_metrics.clone(),
        )?;
        info!(providers = extension_providers.len(), "Loaded extension providers");
        apply_bundle(&index, &providers, authorization_policies, &root_namespace);

        let providers = Arc::new(providers);
        let reload = reload_interval_secs.map(|secs| {
            tokio::spawn(
                reload(
                    path.clone(),
                    index.clone(),
                    providers.clone(),
                    root_namespace.clone(),
                    Duration::from_secs(secs.max(1)),
                )
                .instrument(info_span!("reload")),
            )
        });

        let engine = Engine::new(reader, providers, decision_metrics);
        tokio::select! {
            res = serve(engine, tokio::io::stdin(), tokio::io::stdout()) => res?,
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Received shutdown signal");
            }
        }

        if let Some(task) = reload {
            task.abort();
        }

        if metrics {
            let mut buf = String::new();
            prometheus_client::encoding::text::encode(&mut buf, &prom)?;
            eprint!("{buf}");
        }

        Ok(())
    }
}

/// Validates a bundle's policies and replaces the index's contents with
/// them.
fn apply_bundle(
    index: &SharedIndex,
    providers: &Providers,
    policies: Vec<crate::api::AuthorizationPolicy>,
    root_ns: &str,
) {
    let policies = bundle::admit(policies, root_ns);
    for policy in &policies {
        if let Some(provider) = &policy.spec.provider {
            if !providers.contains(&provider.name) {
                warn!(
                    namespace = %policy.metadata.namespace_or_default(),
                    name = %policy.metadata.name,
                    provider = %provider.name,
                    "Unknown extension provider; matching requests will be denied"
                );
            }
        }
    }
    index.write().reset(policies);

    let index = index.read();
    info!(version = index.version(), "Applied policies");
}

async fn reload(
    path: PathBuf,
    index: SharedIndex,
    providers: Arc<Providers>,
    root_ns: String,
    interval: Duration,
) {
    let mut interval = time::interval(interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick completes immediately and the bundle was just loaded.
    interval.tick().await;

    loop {
        interval.tick().await;
        match load_bundle(&path).await {
            Ok(bundle) => {
                if bundle
                    .extension_providers
                    .iter()
                    .any(|p| !providers.contains(&p.name))
                {
                    warn!("New extension providers are ignored until restart");
                }
                apply_bundle(&index, &providers, bundle.authorization_policies, &root_ns);
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "Failed to reload policies; keeping the current snapshot");
            }
        }
    }
}

fn bundle_schema() -> Result<String> {
    let schema = schemars::schema_for!(PolicyBundle);
    Ok(serde_json::to_string_pretty(&schema)?)
}
