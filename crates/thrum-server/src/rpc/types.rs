//! JSON-RPC 2.0-flavored wire types shared by both transports.
//!
//! The wire format matches one request-or-response object per line on the
//! Unix socket transport and one object per WebSocket text frame — the
//! same [`RpcRequest`]/[`RpcResponse`] pair serializes identically either
//! way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A server-pushed notification: same envelope as a response but with no
/// `id` and a `method` naming the event, per `notification.*` in the wire
/// contract (`notification.message`, `notification.thread.updated`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcNotification {
    pub method: String,
    pub params: Value,
}

impl RpcResponse {
    #[must_use]
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: impl Into<String>, body: RpcErrorBody) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_without_params_omits_the_field() {
        let req = RpcRequest {
            id: "r1".into(),
            method: "system.ping".into(),
            params: None,
        };
        let text = serde_json::to_string(&req).unwrap();
        assert!(!text.contains("params"));
    }

    #[test]
    fn success_response_has_no_error_field() {
        let resp = RpcResponse::success("r1", json!({"ok": true}));
        let text = serde_json::to_string(&resp).unwrap();
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn error_response_has_no_result_field() {
        let resp = RpcResponse::error(
            "r1",
            RpcErrorBody {
                code: "NOT_FOUND".into(),
                message: "gone".into(),
                details: None,
            },
        );
        let text = serde_json::to_string(&resp).unwrap();
        assert!(!text.contains("\"result\""));
    }
}
