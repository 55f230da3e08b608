//! Metrics collection and exposition.
//!
//! # Metrics
//! - `kernel_hook_duration_seconds` (histogram): hook latency by component, phase
//! - `kernel_hook_failures_total` (counter): failed or timed out hooks
//! - `kernel_components` (gauge): nodes in the last resolved graph
//! - `kernel_hooks` (gauge): hooks collected by the last resolve
//! - `kernel_resolve_duration_seconds` (histogram): graph build + construction
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Labels for component and phase only

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::HookPhase;

/// Install the Prometheus exporter, serving on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub(crate) fn record_hook(component: &str, phase: HookPhase, elapsed: Duration, ok: bool) {
    ::metrics::histogram!(
        "kernel_hook_duration_seconds",
        "component" => component.to_string(),
        "phase" => phase.as_str()
    )
    .record(elapsed.as_secs_f64());

    if !ok {
        ::metrics::counter!(
            "kernel_hook_failures_total",
            "component" => component.to_string(),
            "phase" => phase.as_str()
        )
        .increment(1);
    }
}

pub(crate) fn record_resolution(components: usize, hooks: usize, elapsed: Duration) {
    ::metrics::gauge!("kernel_components").set(components as f64);
    ::metrics::gauge!("kernel_hooks").set(hooks as f64);
    ::metrics::histogram!("kernel_resolve_duration_seconds").record(elapsed.as_secs_f64());
}
