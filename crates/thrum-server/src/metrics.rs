//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global). Must be called once at
/// server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder().expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across call sites.

/// RPC requests total (counter, labels: method).
pub const RPC_REQUESTS_TOTAL: &str = "thrum_rpc_requests_total";
/// RPC errors total (counter, labels: method, `error_type`).
pub const RPC_ERRORS_TOTAL: &str = "thrum_rpc_errors_total";
/// RPC request duration seconds (histogram, labels: method).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "thrum_rpc_request_duration_seconds";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "thrum_ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "thrum_ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "thrum_ws_connections_active";
/// Dispatch match outcomes total (counter, labels: `match_type`).
pub const DISPATCH_MATCHES_TOTAL: &str = "thrum_dispatch_matches_total";
/// Dispatch drops total (counter) — a subscriber's buffer was full.
pub const DISPATCH_DROPS_TOTAL: &str = "thrum_dispatch_drops_total";
/// Sync cycles total (counter, labels: result).
pub const SYNC_CYCLES_TOTAL: &str = "thrum_sync_cycles_total";
/// Sync cycle duration seconds (histogram).
pub const SYNC_CYCLE_DURATION_SECONDS: &str = "thrum_sync_cycle_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_render() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            RPC_REQUESTS_TOTAL,
            RPC_ERRORS_TOTAL,
            RPC_REQUEST_DURATION_SECONDS,
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            DISPATCH_MATCHES_TOTAL,
            DISPATCH_DROPS_TOTAL,
            SYNC_CYCLES_TOTAL,
            SYNC_CYCLE_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
