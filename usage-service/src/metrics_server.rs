use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub const READINGS_RECEIVED: &str = "readings_received_total";
pub const READINGS_REJECTED: &str = "readings_rejected_total";
pub const READINGS_DERIVED: &str = "readings_derived_total";
pub const EXCLUDED_RECORDS: &str = "aggregate_excluded_records_total";
pub const CSV_PARSE_ERRORS: &str = "reading_csv_parse_errors_total";
pub const QUERY_DURATION: &str = "query_duration_seconds";

/// Every counter the service emits, with its help text.
const COUNTERS: &[(&str, &str)] = &[
    (READINGS_RECEIVED, "Readings read from a source"),
    (READINGS_REJECTED, "Readings that failed validation"),
    (READINGS_DERIVED, "Readings priced and carbon-rated"),
    (EXCLUDED_RECORDS, "Records whose meter or site could not be joined"),
    (CSV_PARSE_ERRORS, "CSV rows that could not be parsed into a reading"),
];

/// Installs the Prometheus recorder and serves `/metrics` on `bind_addr`.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics bind address '{bind_addr}': {e}"))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}"))?;

    // Ignore error if the handle was already set; this should only be called once.
    let _ = PROM_HANDLE.set(handle);
    describe();

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "serving metrics");
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    tracing::error!(error = %e, "metrics server error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to bind metrics listener");
            }
        }
    });

    Ok(())
}

fn describe() {
    for &(name, help) in COUNTERS {
        metrics::describe_counter!(name, help);
    }
    metrics::describe_histogram!(QUERY_DURATION, metrics::Unit::Seconds, "Aggregation query wall time");
}

async fn metrics_handler() -> String {
    PROM_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_described_once_with_prometheus_names() {
        let mut names: Vec<&str> = COUNTERS.iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&CSV_PARSE_ERRORS));
        assert!(names.iter().all(|name| name.ends_with("_total")));

        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COUNTERS.len());
        assert!(!names.contains(&QUERY_DURATION));
    }
}
