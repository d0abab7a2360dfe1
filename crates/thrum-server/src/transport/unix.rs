//! Accept loop for the Unix domain socket transport.

use std::path::Path;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, warn};

use crate::rpc::{MethodRegistry, RpcContext, RpcRequest, RpcResponse};

/// Bind a Unix socket at `path` and serve JSON-RPC connections until the
/// process is asked to stop. Each accepted connection gets its own
/// read/dispatch/write loop; one request per line in, one response per
/// line out.
pub async fn serve_unix_socket(
    path: &Path,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    debug!(path = %path.display(), "listening on unix socket");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, registry, ctx).await {
                warn!(error = %e, "unix socket connection ended with an error");
            }
        });
    }
}

async fn handle_connection(
    stream: UnixStream,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
) -> std::io::Result<()> {
    let mut lines = Framed::new(stream, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "malformed line on unix socket, closing connection");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparsable RPC request over unix socket");
                let body = serde_json::to_string(&RpcResponse::error(
                    "unknown",
                    crate::rpc::RpcErrorBody {
                        code: crate::rpc::errors::INVALID_PARAMS.into(),
                        message: format!("malformed request: {e}"),
                        details: None,
                    },
                ))
                .expect("RpcResponse always serializes");
                if lines.send(body).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let response = registry.dispatch(request, &ctx).await;
        let Ok(encoded) = serde_json::to_string(&response) else {
            continue;
        };
        if lines.send(encoded).await.is_err() {
            break;
        }
    }

    Ok(())
}
