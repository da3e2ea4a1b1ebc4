use anyhow::Result;
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use shuttle_axum::axum::{routing::get, Router};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. The first call installs it; later calls
    /// share the same handle.
    pub fn init() -> Result<Self> {
        let handle = HANDLE.get_or_try_init(|| -> Result<PrometheusHandle> {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe_counters();
            Ok(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
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

fn describe_counters() {
    describe_counter!("cache_hits_total", "Responses served from a cache store");
    describe_counter!("cache_misses_total", "Responses fetched from the network");
    describe_counter!("cache_purges_total", "Stores purged after a quota error");
    describe_counter!("feed_items_total", "Feed items produced");
    describe_counter!("daily_load_failures_total", "Daily data loads that degraded");
}
