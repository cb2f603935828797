//! Outbound agent-to-agent client: JSON-RPC calls over a pooled `reqwest`
//! client (spec §4.1, used by the Coordinator and the recovery daemon).
//!
//! `server/tools_agent/src/client.rs`'s `ToolClient` holds one
//! `reqwest::Client` per base URL; here that's generalized into a
//! process-wide pool keyed by base URL, since many skills end up calling
//! the same small set of peers repeatedly and `reqwest::Client` is meant
//! to be cloned and reused rather than rebuilt per call.
//! `AgentClient` wraps a pooled client with the three JSON-RPC methods a
//! caller actually issues against a peer.

use crate::error::ErrorKind;
use crate::protocol::{RpcError, RpcRequest, RpcResponse};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

static HTTP_CLIENT_POOL: Lazy<Mutex<HashMap<String, reqwest::Client>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Get or create a pooled client for `base_url`, reusing TCP/TLS state
/// across calls to the same peer.
pub fn get_http_client(base_url: &str) -> reqwest::Client {
    let mut pool = HTTP_CLIENT_POOL.lock().unwrap();
    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }
    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .expect("failed to build HTTP client");
    pool.insert(base_url.to_string(), client.clone());
    client
}

/// A client bound to one peer agent's base URL, for issuing `/a2a` calls.
#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = get_http_client(&base_url);
        Self {
            base_url,
            api_key: api_key.into(),
            client,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ErrorKind> {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Value::from(uuid::Uuid::new_v4().to_string()),
        };

        let response = self
            .client
            .post(format!("{}/a2a", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("request to {}: {e}", self.base_url)))?;

        if response.status().is_server_error() || response.status() == 429 {
            return Err(ErrorKind::Transient(format!(
                "{} responded {}",
                self.base_url,
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ErrorKind::Transient(format!("decoding response: {e}")))?;

        match (body.result, body.error) {
            (Some(result), _) => Ok(result),
            (None, Some(err)) => Err(classify_rpc_error(err)),
            (None, None) => Err(ErrorKind::Fatal("response had neither result nor error".into())),
        }
    }

    /// Invoke `message/send` against `skill` with `params`.
    pub async fn message_send(&self, skill: &str, params: Value) -> Result<Value, ErrorKind> {
        self.call(
            "message/send",
            serde_json::json!({ "skill": skill, "params": params }),
        )
        .await
    }

    /// Fetch task status by id.
    pub async fn tasks_get(&self, task_id: &str) -> Result<Value, ErrorKind> {
        self.call("tasks/get", serde_json::json!({ "id": task_id }))
            .await
    }

    /// Request cancellation of a non-terminal task.
    pub async fn tasks_cancel(&self, task_id: &str) -> Result<Value, ErrorKind> {
        self.call("tasks/cancel", serde_json::json!({ "id": task_id }))
            .await
    }
}

fn classify_rpc_error(err: RpcError) -> ErrorKind {
    match err.code {
        -32001 => ErrorKind::TaskNotFound(err.message),
        -32003 => ErrorKind::TaskTerminal(err.message),
        -32004 => ErrorKind::Unsupported("peer reported unsupported method"),
        -32602 => ErrorKind::InvalidParams(err.message),
        -32600 => ErrorKind::InvalidRequest(err.message),
        -32601 => ErrorKind::SkillUnknown(err.message),
        _ => ErrorKind::Transient(err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuses_client_for_same_base_url() {
        let _ = get_http_client("http://127.0.0.1:9999-test-a");
        let _ = get_http_client("http://127.0.0.1:9999-test-a");
        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        assert_eq!(pool.keys().filter(|k| k.contains("9999-test-a")).count(), 1);
    }

    #[test]
    fn classifies_reserved_codes() {
        assert!(matches!(
            classify_rpc_error(RpcError::new(-32001, "nope")),
            ErrorKind::TaskNotFound(_)
        ));
        assert!(matches!(
            classify_rpc_error(RpcError::new(-32003, "done")),
            ErrorKind::TaskTerminal(_)
        ));
        assert!(matches!(
            classify_rpc_error(RpcError::new(-32603, "oops")),
            ErrorKind::Transient(_)
        ));
    }
}
