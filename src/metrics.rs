use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::push::PushSnapshot;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Static gauges describing the active push configuration.
    pub fn record_snapshot(snapshot: &PushSnapshot) {
        gauge!("push_interval_secs").set(snapshot.interval.as_secs() as f64);
        gauge!("push_watched_uids", "kind" => "dynamic").set(snapshot.routes.dynamic.len() as f64);
        gauge!("push_watched_uids", "kind" => "live").set(snapshot.routes.live.len() as f64);
        gauge!("push_watched_uids", "kind" => "season").set(snapshot.routes.season.len() as f64);
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
