use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    index_size: Family<NamespacedIndexLabels, Gauge>,
    index_applies: Family<NamespacedIndexLabels, Counter>,
    index_deletes: Family<NamespacedIndexLabels, Counter>,
    index_resets: Counter,
    index_rejects: Family<NamespacedIndexLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespacedIndexLabels {
    namespace: String,
}

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "index_size",
            "Gauge of the number of policies in the index",
            metrics.index_size.clone(),
        );
        prom.register(
            "index_applies",
            "Count of applies to the index",
            metrics.index_applies.clone(),
        );
        prom.register(
            "index_deletes",
            "Count of deletes to the index",
            metrics.index_deletes.clone(),
        );
        prom.register(
            "index_resets",
            "Count of resets to the index",
            metrics.index_resets.clone(),
        );
        prom.register(
            "index_rejects",
            "Count of invalid policies ignored by the index",
            metrics.index_rejects.clone(),
        );
        metrics
    }

    pub(crate) fn applied(&self, namespace: &str) {
        self.index_applies.get_or_create(&labels(namespace)).inc();
    }

    pub(crate) fn deleted(&self, namespace: &str) {
        self.index_deletes.get_or_create(&labels(namespace)).inc();
    }

    pub(crate) fn rejected(&self, namespace: &str) {
        self.index_rejects.get_or_create(&labels(namespace)).inc();
    }

    pub(crate) fn reset(&self) {
        self.index_resets.inc();
    }

    pub(crate) fn set_size(&self, namespace: &str, size: usize) {
        self.index_size
            .get_or_create(&labels(namespace))
            .set(size as i64);
    }
}

fn labels(namespace: &str) -> NamespacedIndexLabels {
    NamespacedIndexLabels {
        namespace: namespace.to_string(),
    }
}
