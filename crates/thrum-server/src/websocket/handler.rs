//! The axum upgrade route and per-connection read/write loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde::Deserialize;
use thrum_messaging::Subscriber;
use tracing::{debug, warn};

use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::rpc::{MethodRegistry, RpcContext, RpcRequest};

/// Shared state handed to every axum route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MethodRegistry>,
    pub ctx: Arc<RpcContext>,
}

#[derive(Deserialize)]
pub struct ConnectQuery {
    /// Binds the connection's [`Subscriber`] to a single agent's mentions
    /// and scopes; omit to receive nothing but direct request/response
    /// traffic (no pushed notifications).
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.agent_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, agent_id: Option<String>) {
    let connection_id = thrum_events::log::ids::generate().to_string();
    let (subscriber, mut notifications) = Subscriber::new(connection_id.clone(), agent_id, 64);
    let subscriber = Arc::new(subscriber);
    state.ctx.dispatcher.register(Arc::clone(&subscriber)).await;
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(incoming) = incoming else { break };
                match incoming {
                    Ok(Message::Text(text)) => {
                        let response = match serde_json::from_str::<RpcRequest>(&text) {
                            Ok(request) => state.registry.dispatch(request, &state.ctx).await,
                            Err(e) => {
                                warn!(error = %e, "malformed RPC request over websocket");
                                continue;
                            }
                        };
                        let Ok(encoded) = serde_json::to_string(&response) else { continue };
                        if sink.send(Message::Text(encoded.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            payload = notifications.recv() => {
                let Some(payload) = payload else { break };
                if sink.send(Message::Text(payload.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.ctx.dispatcher.remove(&connection_id).await;
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
}
