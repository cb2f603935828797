//! Structured logging and metrics export setup, run once per process at
//! boot (SPEC_FULL.md ambient-stack section).

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a JSON-formatted tracing subscriber reading its filter from
/// `RUST_LOG` (defaulting to `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .json()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed");
    }
}

/// Install the process-wide Prometheus recorder and start its exporter on
/// `metrics_port`. Mirrors the breaker's `metrics::counter!` calls and
/// whatever else the process records into a scrapeable `/metrics` surface.
pub fn init_metrics(metrics_port: u16) {
    let builder = PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port));
    if let Err(err) = builder.install() {
        tracing::warn!(%err, "failed to install prometheus recorder");
    }
}
