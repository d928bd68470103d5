use crate::core::{Decision, Effect, ExtensionError};
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct DecisionMetrics {
    decisions: Family<DecisionLabels, Counter>,
    extension_errors: Family<ExtensionLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct DecisionLabels {
    effect: EffectLabel,
    audit: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
enum EffectLabel {
    Allow,
    Deny,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ExtensionLabels {
    provider: String,
    error: ErrorLabel,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
enum ErrorLabel {
    Unknown,
    Timeout,
    Failed,
}

impl DecisionMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "decisions",
            "Count of authorization decisions",
            metrics.decisions.clone(),
        );
        prom.register(
            "extension_errors",
            "Count of failed extension provider calls",
            metrics.extension_errors.clone(),
        );
        metrics
    }

    pub(crate) fn decision(&self, decision: &Decision) {
        let effect = match decision.effect {
            Effect::Allow => EffectLabel::Allow,
            Effect::Deny => EffectLabel::Deny,
        };
        self.decisions
            .get_or_create(&DecisionLabels {
                effect,
                audit: decision.audit.to_string(),
            })
            .inc();
    }

    pub(crate) fn extension_error(&self, error: &ExtensionError) {
        let (provider, error) = match error {
            ExtensionError::Unknown(p) => (p, ErrorLabel::Unknown),
            ExtensionError::Timeout(p) => (p, ErrorLabel::Timeout),
            ExtensionError::Failed { provider, .. } => (provider, ErrorLabel::Failed),
        };
        self.extension_errors
            .get_or_create(&ExtensionLabels {
                provider: provider.clone(),
                error,
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn decisions(&self, effect: Effect, audit: bool) -> u64 {
        let effect = match effect {
            Effect::Allow => EffectLabel::Allow,
            Effect::Deny => EffectLabel::Deny,
        };
        self.decisions
            .get_or_create(&DecisionLabels {
                effect,
                audit: audit.to_string(),
            })
            .get()
    }
}
