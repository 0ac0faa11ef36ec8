use {
    prometheus::Encoder,
    std::{collections::HashMap, sync::OnceLock},
};

/// Global metrics registry used by all components.
static REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

/// Configure global metrics registry.
///
/// This function allows specifying common prefix that will be added
/// to all metric names, as well as common labels.
///
/// It should be called at most once, before any call to [`get_registry`],
/// ideally in the very beginning of the `main` function. Later calls are
/// ignored with a warning.
pub fn setup_registry(prefix: Option<String>, labels: Option<HashMap<String, String>>) {
    let registry = match prometheus::Registry::new_custom(prefix, labels) {
        Ok(registry) => registry,
        Err(err) => {
            tracing::warn!(?err, "invalid metrics registry configuration");
            return;
        }
    };
    let storage_registry = prometheus_metric_storage::StorageRegistry::new(registry);
    if REGISTRY.set(storage_registry).is_err() {
        tracing::warn!("metrics registry was already initialized");
    }
}

/// Get the global instance of the metrics registry.
pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Get the global instance of the metric storage registry.
///
/// If the registry was not configured with [`setup_registry`] it gets
/// initialized with a default value, which keeps unit tests free of setup
/// code.
pub fn get_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    REGISTRY.get_or_init(prometheus_metric_storage::StorageRegistry::default)
}

/// Renders all metrics of the registry in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(?err, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// `/metrics` route exposing encoded prometheus data to monitoring systems.
pub fn handle_metrics<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn metrics_handler() -> String {
        encode(get_registry())
    }

    axum::Router::new().route("/metrics", axum::routing::get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(prometheus_metric_storage::MetricStorage)]
    #[metric(subsystem = "observe_test")]
    struct Metrics {
        /// Counter used to check the text encoding.
        ticks: prometheus::IntCounter,
    }

    #[test]
    fn encodes_registered_metrics() {
        let metrics = Metrics::instance(get_storage_registry()).unwrap();
        metrics.ticks.inc();

        let encoded = encode(get_registry());
        assert!(encoded.contains("observe_test_ticks 1"));
    }
}
