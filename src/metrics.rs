use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("rank_runs_total", "Ranking runs by scoring path (mode=llm|fallback).");
        describe_counter!(
            "service_repairs_total",
            "Structured requests that needed a repair round-trip."
        );
        describe_counter!(
            "service_failures_total",
            "Structured requests that failed after retries and repair."
        );
        describe_counter!(
            "listings_dropped_total",
            "Raw listing records dropped by normalization."
        );
        describe_counter!("source_errors_total", "Listing source fetch/parse errors.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the active fit threshold.
    pub fn init(fit_threshold: u8) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        gauge!("rank_fit_threshold").set(f64::from(fit_threshold));
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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
