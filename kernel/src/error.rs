//! Error kinds shared across the monitoring-pipeline agents.
//!
//! `ErrorKind` is the single place that maps the application-level failure
//! taxonomy onto JSON-RPC error codes. Local errors (`store::StoreError`,
//! per-agent errors) convert into this type at the skill-dispatch boundary;
//! they are never propagated past it in their own shape. Derives its
//! `Display`/`Error` impls with `thiserror`, the same crate `agents/src/error.rs`
//! and `server/gateway/src/auth.rs`'s `AuthError` use for their own
//! module-local error enums.

use thiserror::Error;

/// Application error taxonomy. See spec §7 for the full propagation table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed JSON-RPC request: missing `method`, bad envelope shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Skill parameters failed schema/validation.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// Missing or incorrect bearer/API key.
    #[error("unauthorized")]
    Unauthorized,
    /// No skill registered under the requested name.
    #[error("unknown skill: {0}")]
    SkillUnknown(String),
    /// `tasks/get` on an id the store has no record of.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// `tasks/cancel` on a task already in a terminal state.
    #[error("task terminal: {0}")]
    TaskTerminal(String),
    /// `message/stream`, push-notification config, `tasks/resubscribe`.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// 5xx, network failure, timeout, or 429 — eligible for retry.
    #[error("transient error: {0}")]
    Transient(String),
    /// Retry budget exhausted for a transient failure.
    #[error("retry budget exhausted: {0}")]
    Exhausted(String),
    /// Pre-emptive rejection by an open circuit breaker.
    #[error("circuit open: {0}")]
    CircuitOpen(String),
    /// Programming error; never expected to be retried.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ErrorKind {
    /// Maps this error onto its JSON-RPC 2.0 error code and message, per
    /// the table in spec §7. Application errors outside the standard
    /// framing codes live in the reserved range -32001..-32004.
    pub fn to_jsonrpc_error(&self) -> (i64, String) {
        match self {
            ErrorKind::InvalidRequest(msg) => (-32600, msg.clone()),
            ErrorKind::InvalidParams(msg) => (-32602, msg.clone()),
            ErrorKind::SkillUnknown(name) => (-32601, format!("unknown method: {name}")),
            ErrorKind::TaskNotFound(id) => (-32001, format!("no such task: {id}")),
            ErrorKind::TaskTerminal(id) => (-32003, format!("task {id} already terminal")),
            ErrorKind::Unsupported(method) => (-32004, format!("unsupported: {method}")),
            // Transient/Exhausted/CircuitOpen/Fatal surface as internal errors
            // over JSON-RPC; the Task row carries the richer `status`/`error`
            // detail that the Coordinator actually acts on.
            ErrorKind::Transient(msg) => (-32603, msg.clone()),
            ErrorKind::Exhausted(msg) => (-32603, msg.clone()),
            ErrorKind::CircuitOpen(msg) => (-32603, msg.clone()),
            ErrorKind::Fatal(msg) => (-32603, msg.clone()),
            ErrorKind::Unauthorized => (-32600, "unauthorized".to_string()),
        }
    }

    /// Whether this error is eligible for the bounded retry in §4.5.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_reserved_range_correctly() {
        assert_eq!(
            ErrorKind::TaskNotFound("abc".into()).to_jsonrpc_error().0,
            -32001
        );
        assert_eq!(
            ErrorKind::TaskTerminal("abc".into()).to_jsonrpc_error().0,
            -32003
        );
        assert_eq!(
            ErrorKind::Unsupported("tasks/resubscribe")
                .to_jsonrpc_error()
                .0,
            -32004
        );
        assert_eq!(
            ErrorKind::SkillUnknown("foo".into()).to_jsonrpc_error().0,
            -32601
        );
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(ErrorKind::Transient("timeout".into()).is_transient());
        assert!(!ErrorKind::Fatal("bug".into()).is_transient());
        assert!(!ErrorKind::CircuitOpen("reddit-api".into()).is_transient());
    }
}
