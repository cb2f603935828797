//! Axum HTTP surface: `/a2a`, `/.well-known/agent.json`, `/health`,
//! `/discover` (spec §4.1, §4.2).
//!
//! Grounded on `server/gateway/src/main.rs`'s router assembly — `Router::new()`,
//! `.route(path, get/post(handler))`, shared state threaded through axum's
//! `State` extractor, `TcpListener::bind` then `axum::serve` — the same
//! "router owns wiring, business logic lives behind a trait" split the
//! gateway draws between its `main.rs` and the `noa_gateway` library.

use crate::agent_card::AgentCard;
use crate::auth::ApiKeyAuth;
use crate::dispatch::Dispatcher;
use crate::protocol::{RpcRequest, RpcResponse};
use crate::registry::Registry;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub agent_card: Arc<AgentCard>,
    pub registry: Option<Arc<dyn Registry>>,
    pub discover_auth: ApiKeyAuth,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/a2a", post(handle_a2a))
        .route("/.well-known/agent.json", get(handle_agent_card))
        .route("/health", get(handle_health))
        .route("/discover", get(handle_discover))
        .with_state(state)
}

fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

async fn handle_a2a(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    let response = state.dispatcher.handle(request, bearer_header(&headers)).await;
    Json(response)
}

async fn handle_agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json((*state.agent_card).clone())
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn handle_discover(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match bearer_header(&headers) {
        Some(header) if state.discover_auth.validate(header) => {}
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response()
        }
    }

    let Some(registry) = &state.registry else {
        return (StatusCode::OK, Json(json!({"services": []}))).into_response();
    };

    match registry.discover_all().await {
        Ok(entries) => (StatusCode::OK, Json(json!({"services": entries}))).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerRegistry;
    use crate::config::BreakerConfig;
    use crate::dispatch::{TaskRecord, TaskSink, TaskStatus};
    use crate::error::ErrorKind;
    use crate::skill::SkillRegistry;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct NullTasks;

    #[async_trait]
    impl TaskSink for NullTasks {
        async fn find_existing(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Option<TaskRecord>, ErrorKind> {
            Ok(None)
        }
        async fn start(&self, _: &str, _: &str, _: &str, _: &Value) -> Result<TaskRecord, ErrorKind> {
            Ok(TaskRecord {
                id: "t1".into(),
                status: TaskStatus::Running,
                result: None,
                error: None,
            })
        }
        async fn complete(&self, _: &str, _: Value) -> Result<(), ErrorKind> {
            Ok(())
        }
        async fn fail(&self, _: &str, _: &str) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    fn state() -> AppState {
        AppState {
            dispatcher: Dispatcher {
                agent_role: "retrieval".into(),
                auth: ApiKeyAuth::new("secret"),
                skills: SkillRegistry::new(),
                breakers: Arc::new(BreakerRegistry::new(BreakerConfig::default())),
                tasks: Arc::new(NullTasks),
            },
            agent_card: Arc::new(AgentCard::new("retrieval", "fetches posts", "http://h:8001")),
            registry: None,
            discover_auth: ApiKeyAuth::new("secret"),
        }
    }

    #[tokio::test]
    async fn health_requires_no_auth() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_card_requires_no_auth() {
        let app = router(state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/agent.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn discover_rejects_missing_auth() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().uri("/discover").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
