//! Wire protocol: inbound merge payloads, outbound channel frames, and the
//! endpoint paths the backend serves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::PatchOp;

/// Endpoint paths consumed by the engine. The exact strings are a contract
/// with the backend.
pub mod paths {
    /// Initial `state` snapshot. The response may carry
    /// [`super::INSPECTION_MODE_HEADER`].
    pub const APP_STATE: &str = "/app-state";
    /// Initial `data` snapshot.
    pub const APP_DATA: &str = "/app-data";
    /// Session metadata (server address, task id, auth token, environment).
    pub const SESSION_INFO: &str = "/session-info";
    /// Owning-task metadata; seeds the documents in static mode.
    pub const TASK_INFO: &str = "/task-info";
    /// Opportunistic upstream persistence of the `state` document.
    pub const SYNC_STATE: &str = "/app-sync-state";
    /// Best-effort shutdown notification.
    pub const SHUTDOWN: &str = "/app-shutdown";
    /// Persistent push channel route.
    pub const CHANNEL: &str = "/app-ws";
}

/// Response header that flags a debug/inspection session on the initial
/// state fetch. Inspection sessions opt out of automatic reconnection.
pub const INSPECTION_MODE_HEADER: &str = "x-inspection-mode";

/// Reserved action name carrying push-channel task status notifications.
pub const TASK_STATUS_ACTION: &str = "task-status";

/// Inbound message: patch batches for either document and/or an action to
/// run. Also the shape of a command endpoint's optional response body
/// (minus `runAction`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePayload {
    /// Patch batch for the `state` document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<PatchOp>>,
    /// Patch batch for the `data` document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<PatchOp>>,
    /// An action for the embedding environment to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_action: Option<RunAction>,
}

impl MergePayload {
    /// True when the payload carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.data.is_none() && self.run_action.is_none()
    }
}

/// An action pushed by the backend for the embedding environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAction {
    /// Action name.
    pub action: String,
    /// Opaque action payload.
    #[serde(default)]
    pub payload: Value,
}

/// Client→server frame on the persistent channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCommand {
    /// Command name.
    pub command: String,
    /// Snapshot of the `state` document at send time.
    pub state: Value,
    /// Integration context from the launch URL.
    pub context: Value,
    /// Command payload.
    pub payload: Value,
}

/// Session metadata returned by the session-info endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Backend server address.
    #[serde(default)]
    pub server_address: Option<String>,
    /// Identifier of the owning task.
    #[serde(default)]
    pub task_id: Option<i64>,
    /// Authentication token for subsequent calls.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Environment label (e.g. "production").
    #[serde(default)]
    pub environment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchKind;
    use serde_json::json;

    #[test]
    fn test_merge_payload_with_state_batch() {
        let json = r#"{"state": [{"op": "replace", "path": "/count", "value": 5}]}"#;
        let payload: MergePayload = serde_json::from_str(json).unwrap();
        let batch = payload.state.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].op, PatchKind::Replace);
        assert_eq!(batch[0].path, "/count");
        assert!(payload.data.is_none());
        assert!(payload.run_action.is_none());
    }

    #[test]
    fn test_merge_payload_run_action() {
        let json = r#"{"runAction": {"action": "open-panel", "payload": {"id": 3}}}"#;
        let payload: MergePayload = serde_json::from_str(json).unwrap();
        let action = payload.run_action.unwrap();
        assert_eq!(action.action, "open-panel");
        assert_eq!(action.payload, json!({"id": 3}));
    }

    #[test]
    fn test_merge_payload_action_without_payload() {
        let json = r#"{"runAction": {"action": "refresh"}}"#;
        let payload: MergePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.run_action.unwrap().payload, Value::Null);
    }

    #[test]
    fn test_empty_payload() {
        let payload: MergePayload = serde_json::from_str("{}").unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_channel_command_shape() {
        let frame = ChannelCommand {
            command: "select".to_string(),
            state: json!({"count": 1}),
            context: json!({"sessionId": "abc"}),
            payload: json!({"row": 4}),
        };
        let text = serde_json::to_string(&frame).unwrap();
        let round: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(round["command"], "select");
        assert_eq!(round["state"]["count"], 1);
        assert_eq!(round["payload"]["row"], 4);
    }

    #[test]
    fn test_session_info_tolerates_missing_fields() {
        let info: SessionInfo = serde_json::from_str(r#"{"taskId": 77}"#).unwrap();
        assert_eq!(info.task_id, Some(77));
        assert!(info.server_address.is_none());
        assert!(info.api_token.is_none());
    }

    #[test]
    fn test_invalid_json_fails() {
        let result: std::result::Result<MergePayload, _> =
            serde_json::from_str("not valid json");
        assert!(result.is_err());
    }
}
