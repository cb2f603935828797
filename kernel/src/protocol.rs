//! JSON-RPC 2.0 envelope types for the agent protocol (spec §4.1).
//!
//! Every agent exposes exactly one protocol endpoint (`/a2a`) accepting a
//! single JSON-RPC request object per POST. Grounded on `server/mcp/src/main.rs`'s
//! `RpcRequest`/`RpcResponse`/`RpcError` structs (jsonrpc version tag,
//! optional `id`, `Option`-skipping `result`/`error` fields over stdio),
//! carried over essentially unchanged onto an HTTP POST body instead of a
//! newline-delimited stdio stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON-RPC methods this protocol recognises. Any other method string
/// yields error code -32601 (spec §4.1 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    MessageSend,
    MessageStream,
    TasksGet,
    TasksCancel,
    TasksPushNotificationConfigSet,
    TasksPushNotificationConfigGet,
    TasksResubscribe,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "message/send" => Method::MessageSend,
            "message/stream" => Method::MessageStream,
            "tasks/get" => Method::TasksGet,
            "tasks/cancel" => Method::TasksCancel,
            "tasks/pushNotificationConfig/set" => Method::TasksPushNotificationConfigSet,
            "tasks/pushNotificationConfig/get" => Method::TasksPushNotificationConfigGet,
            "tasks/resubscribe" => Method::TasksResubscribe,
            _ => return None,
        })
    }

    /// Whether this method is a stub reserved for future streaming/push
    /// support (spec §4.1: these always return -32004 *unsupported*).
    pub fn is_reserved_stub(&self) -> bool {
        matches!(
            self,
            Method::MessageStream
                | Method::TasksPushNotificationConfigSet
                | Method::TasksPushNotificationConfigGet
                | Method::TasksResubscribe
        )
    }
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(-32600, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(-32602, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("method not found: {method}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(-32603, message)
    }
}

/// A JSON-RPC 2.0 response envelope: exactly one of `result`/`error` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_does_not_parse() {
        assert!(Method::parse("message/delete").is_none());
    }

    #[test]
    fn reserved_stubs_are_flagged() {
        assert!(Method::MessageStream.is_reserved_stub());
        assert!(Method::TasksResubscribe.is_reserved_stub());
        assert!(!Method::MessageSend.is_reserved_stub());
    }

    #[test]
    fn response_serializes_result_xor_error() {
        let ok = RpcResponse::success(Value::from(1), Value::from("done"));
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("result").is_some());
        assert!(json.get("error").is_none());

        let err = RpcResponse::failure(Value::from(1), RpcError::method_not_found("nope"));
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("result").is_none());
    }
}
