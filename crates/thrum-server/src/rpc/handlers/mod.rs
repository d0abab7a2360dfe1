//! RPC handler modules and registration.

pub mod agent;
pub mod context;
pub mod group;
pub mod message;
pub mod subscription;
pub mod sync;
pub mod system;
pub mod thread;

use crate::rpc::registry::MethodRegistry;

/// Register every RPC method this server exposes.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register("health", system::HealthHandler);
    registry.register("system.ping", system::PingHandler);

    registry.register("agent.register", agent::RegisterHandler);
    registry.register("agent.delete", agent::DeleteHandler);
    registry.register("agent.list", agent::ListHandler);
    registry.register("agent.update", agent::UpdateHandler);
    registry.register("session.start", agent::SessionStartHandler);
    registry.register("session.end", agent::SessionEndHandler);
    registry.register("session.list", agent::SessionListHandler);
    registry.register("session.heartbeat", agent::HeartbeatHandler);

    registry.register("thread.create", thread::CreateHandler);
    registry.register("thread.list", thread::ListHandler);
    registry.register("thread.get", thread::GetHandler);

    registry.register("message.send", message::SendHandler);
    registry.register("message.list", message::ListHandler);
    registry.register("message.get", message::GetHandler);
    registry.register("message.edit", message::EditHandler);
    registry.register("message.delete", message::DeleteHandler);
    registry.register("message.markRead", message::MarkReadHandler);

    registry.register("subscribe", subscription::SubscribeHandler);
    registry.register("unsubscribe", subscription::UnsubscribeHandler);
    registry.register("subscriptions.list", subscription::ListHandler);

    registry.register("group.create", group::CreateHandler);
    registry.register("group.delete", group::DeleteHandler);
    registry.register("group.list", group::ListHandler);
    registry.register("group.info", group::InfoHandler);
    registry.register("group.member.add", group::AddMemberHandler);
    registry.register("group.member.remove", group::RemoveMemberHandler);
    registry.register("group.members", group::MembersHandler);

    registry.register("sync.status", sync::StatusHandler);
    registry.register("sync.force", sync::ForceHandler);

    registry.register("context.save", context::SaveHandler);
    registry.register("context.show", context::ShowHandler);
    registry.register("context.clear", context::ClearHandler);
    registry.register("context.preamble.save", context::PreambleSaveHandler);
    registry.register("context.preamble.show", context::PreambleShowHandler);
}

/// Extract a required parameter.
pub(crate) fn require_param<'a>(
    params: Option<&'a serde_json::Value>,
    key: &str,
) -> Result<&'a serde_json::Value, crate::rpc::errors::RpcError> {
    params
        .and_then(|p| p.get(key))
        .ok_or_else(|| crate::rpc::errors::RpcError::InvalidParams {
            message: format!("missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<String, crate::rpc::errors::RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| crate::rpc::errors::RpcError::InvalidParams {
            message: format!("parameter '{key}' must be a string"),
        })
}

/// Extract an optional string parameter.
pub(crate) fn optional_string_param(params: Option<&serde_json::Value>, key: &str) -> Option<String> {
    params.and_then(|p| p.get(key)).and_then(|v| v.as_str()).map(String::from)
}

/// Extract an optional array-of-strings parameter, defaulting to empty.
pub(crate) fn optional_string_array_param(params: Option<&serde_json::Value>, key: &str) -> Vec<String> {
    params
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

/// Current timestamp in the RFC-3339 UTC form every row in the projection uses.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_string_param_ok() {
        let params = Some(json!({"id": "abc"}));
        assert_eq!(require_string_param(params.as_ref(), "id").unwrap(), "abc");
    }

    #[test]
    fn require_string_param_missing_is_invalid() {
        let err = require_string_param(None, "id").unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::INVALID_PARAMS);
    }

    #[test]
    fn require_string_param_wrong_type_is_invalid() {
        let params = Some(json!({"id": 5}));
        let err = require_string_param(params.as_ref(), "id").unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::INVALID_PARAMS);
    }

    #[test]
    fn optional_string_array_param_defaults_empty() {
        assert!(optional_string_array_param(None, "scopes").is_empty());
    }
}
