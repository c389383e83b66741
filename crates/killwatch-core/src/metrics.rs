//! Prometheus metrics helpers for Killwatch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use killwatch_core::metrics::{init_metrics, start_metrics_server};
//!
//! let handle = init_metrics();
//! start_metrics_server(9090, handle).await?;
//!
//! metrics::counter!("killwatch_polls_total").increment(1);
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `killwatch_`
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only low-cardinality values (error kind, relevance reason)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub const POLLS_TOTAL: &str = "killwatch_polls_total";
pub const POLL_ERRORS_TOTAL: &str = "killwatch_poll_errors_total";
pub const KILLMAILS_RECEIVED_TOTAL: &str = "killwatch_killmails_received_total";
pub const KILLMAILS_RELEVANT_TOTAL: &str = "killwatch_killmails_relevant_total";
pub const FORMAT_FAILURES_TOTAL: &str = "killwatch_format_failures_total";
pub const NOTIFICATIONS_SENT_TOTAL: &str = "killwatch_notifications_sent_total";
pub const NOTIFICATIONS_FAILED_TOTAL: &str = "killwatch_notifications_failed_total";
pub const ESI_REQUESTS_TOTAL: &str = "killwatch_esi_requests_total";
pub const RUNNING: &str = "killwatch_running";

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metric_descriptions();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Serve `/metrics` on the given port from a background task.
///
/// The listener is bound before returning so a port conflict is reported to
/// the caller instead of being lost inside the task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(POLLS_TOTAL, "Completed RedisQ long-poll cycles");
    describe_counter!(
        POLL_ERRORS_TOTAL,
        "Failed RedisQ polls (label: kind = transient|fatal)"
    );
    describe_counter!(KILLMAILS_RECEIVED_TOTAL, "Killmails received from the feed");
    describe_counter!(
        KILLMAILS_RELEVANT_TOTAL,
        "Killmails matching the watchlist (label: reason)"
    );
    describe_counter!(
        FORMAT_FAILURES_TOTAL,
        "Relevant killmails that could not be formatted"
    );
    describe_counter!(NOTIFICATIONS_SENT_TOTAL, "Notifications delivered to Matrix");
    describe_counter!(
        NOTIFICATIONS_FAILED_TOTAL,
        "Notifications dropped after a delivery failure"
    );
    describe_counter!(
        ESI_REQUESTS_TOTAL,
        "Reference-data requests to ESI (label: outcome = ok|error)"
    );
    describe_gauge!(RUNNING, "Whether the poll loop is running (1=yes, 0=no)");
}
