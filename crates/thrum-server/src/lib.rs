//! JSON-RPC surface for the messaging substrate: a method registry shared
//! by a Unix domain socket transport and a WebSocket upgrade route, plus
//! the Prometheus `/metrics` endpoint both transports report to.

#![deny(unsafe_code)]

pub mod metrics;
pub mod rpc;
pub mod transport;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::rpc::{MethodRegistry, RpcContext};
use crate::websocket::AppState;

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Generates request ids out of the same sortable id scheme the event log
/// uses, rather than pulling in a separate id crate just for this.
#[derive(Clone)]
struct ThrumRequestId;

impl MakeRequestId for ThrumRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = thrum_events::log::ids::generate().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Assemble the `axum::Router` this server exposes: the websocket upgrade
/// route plus `/metrics`. The Unix socket transport runs independently
/// via [`transport::serve_unix_socket`] — it has no HTTP surface.
pub fn build_router(registry: Arc<MethodRegistry>, ctx: Arc<RpcContext>, prometheus: PrometheusHandle) -> Router {
    let state = AppState { registry, ctx };

    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
        .route("/metrics", get(move || render_metrics(prometheus.clone())))
        // Outermost layers run first on the request, last on the response.
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(ThrumRequestId))
        .layer(PropagateRequestIdLayer::x_request_id())
}

async fn render_metrics(handle: PrometheusHandle) -> String {
    metrics::render(&handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;

    #[test]
    fn build_router_does_not_panic() {
        let registry = Arc::new(rpc::build_registry());
        let ctx = Arc::new(make_test_context());
        let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder().handle();
        let _router = build_router(registry, ctx, prometheus);
    }
}
