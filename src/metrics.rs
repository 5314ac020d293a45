use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe every series up front so
    /// they show up on /metrics before first use.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!(
            "bias_labels_total",
            "Labels produced, tagged by provenance (map/cache/model)."
        );
        describe_counter!("bias_worker_spawns_total", "Classifier worker processes started.");
        describe_counter!("bias_worker_exits_total", "Classifier worker exits observed.");
        describe_counter!(
            "bias_worker_timeouts_total",
            "Batches that soft-failed to Unknown on deadline."
        );
        describe_counter!(
            "coverage_strategy_hits_total",
            "Coverage responses, tagged by the strategy that produced them."
        );
        describe_counter!(
            "coverage_exhausted_total",
            "Events for which every retrieval strategy came back empty."
        );

        Self { handle }
    }

    /// Router exposing `/metrics` in Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
