//! The base `message/send` handler: auth, idempotency, tracing, breaker,
//! and task persistence composed around a single skill call (spec §4.1).
//!
//! `kernel` has no dependency on `store`, so persistence is reached through
//! the narrow [`TaskSink`] trait rather than a concrete `sqlx` type —
//! the same split `server/gateway`'s binary draws between `noa_gateway`
//! (business logic behind `Gateway`/`GatewayRequest`) and the concrete
//! `PgPoolOptions` connection it builds in `main.rs`: the library crate
//! never names `sqlx` itself. `store::TaskStore` implements `TaskSink`.

use crate::auth::ApiKeyAuth;
use crate::breaker::BreakerRegistry;
use crate::error::ErrorKind;
use crate::idempotency::parameters_hash;
use crate::protocol::{Method, RpcError, RpcRequest, RpcResponse};
use crate::skill::SkillRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Status of a persisted task row (spec §5 `tasks` table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A persisted record of one `message/send` call, keyed for idempotent
/// replay by `(workflow_id, agent_role, skill_name, parameters_hash)`.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Narrow persistence seam `dispatch` programs against.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Look up a prior task by its idempotency key. A hit with `Completed`
    /// status short-circuits re-execution and replays the stored result.
    async fn find_existing(
        &self,
        agent_role: &str,
        skill_name: &str,
        parameters_hash: &str,
    ) -> Result<Option<TaskRecord>, ErrorKind>;

    /// Insert a new `Running` task row, returning its generated id.
    async fn start(
        &self,
        agent_role: &str,
        skill_name: &str,
        parameters_hash: &str,
        params: &Value,
    ) -> Result<TaskRecord, ErrorKind>;

    async fn complete(&self, task_id: &str, result: Value) -> Result<(), ErrorKind>;

    async fn fail(&self, task_id: &str, error: &str) -> Result<(), ErrorKind>;
}

/// Everything a dispatcher needs to answer one `/a2a` request.
#[derive(Clone)]
pub struct Dispatcher {
    pub agent_role: String,
    pub auth: ApiKeyAuth,
    pub skills: SkillRegistry,
    pub breakers: Arc<BreakerRegistry>,
    pub tasks: Arc<dyn TaskSink>,
}

impl Dispatcher {
    /// Handle one already-deserialized JSON-RPC request, authenticated via
    /// `auth_header` (the raw `Authorization` header value, if present).
    pub async fn handle(&self, request: RpcRequest, auth_header: Option<&str>) -> RpcResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "dispatch",
            correlation_id = %correlation_id,
            method = %request.method,
            agent_role = %self.agent_role,
        );
        let _enter = span.enter();

        match self.handle_inner(&request, auth_header).await {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(err) => {
                let (code, message) = err.to_jsonrpc_error();
                tracing::warn!(code, %message, "dispatch failed");
                RpcResponse::failure(request.id, RpcError::new(code, message))
            }
        }
    }

    async fn handle_inner(
        &self,
        request: &RpcRequest,
        auth_header: Option<&str>,
    ) -> Result<Value, ErrorKind> {
        match auth_header {
            Some(header) if self.auth.validate(header) => {}
            _ => return Err(ErrorKind::Unauthorized),
        }

        let method = Method::parse(&request.method)
            .ok_or_else(|| ErrorKind::SkillUnknown(request.method.clone()))?;

        if method.is_reserved_stub() {
            return Err(ErrorKind::Unsupported("streaming and push notifications are not implemented"));
        }

        if !matches!(method, Method::MessageSend) {
            return Err(ErrorKind::InvalidRequest(format!(
                "{} is not handled by this dispatcher",
                request.method
            )));
        }

        let skill_name = request
            .params
            .get("skill")
            .and_then(Value::as_str)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `skill`".to_string()))?
            .to_string();
        let params = request.params.get("params").cloned().unwrap_or(Value::Null);

        let hash = parameters_hash(&params);

        if let Some(existing) = self
            .tasks
            .find_existing(&self.agent_role, &skill_name, &hash)
            .await?
        {
            return match existing.status {
                TaskStatus::Completed => Ok(existing.result.unwrap_or(Value::Null)),
                TaskStatus::Failed => Err(ErrorKind::Fatal(
                    existing.error.unwrap_or_else(|| "prior attempt failed".into()),
                )),
                TaskStatus::Running | TaskStatus::Cancelled => {
                    Err(ErrorKind::TaskTerminal(existing.id))
                }
            };
        }

        let task = self
            .tasks
            .start(&self.agent_role, &skill_name, &hash, &params)
            .await?;

        let breaker = self.breakers.get_or_create(&skill_name, None);
        let skills = self.skills.clone();
        let skill_name_for_call = skill_name.clone();
        let params_for_call = params.clone();

        let outcome = breaker
            .call(|| async move { skills.dispatch(&skill_name_for_call, params_for_call).await })
            .await;

        match outcome {
            Ok(result) => {
                self.tasks.complete(&task.id, result.clone()).await?;
                Ok(result)
            }
            Err(err) => {
                self.tasks.fail(&task.id, &err.to_string()).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use crate::skill::Skill;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Skill for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
            Ok(params)
        }
    }

    #[derive(Default)]
    struct InMemoryTasks {
        rows: Mutex<std::collections::HashMap<String, TaskRecord>>,
        by_hash: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl TaskSink for InMemoryTasks {
        async fn find_existing(
            &self,
            agent_role: &str,
            skill_name: &str,
            parameters_hash: &str,
        ) -> Result<Option<TaskRecord>, ErrorKind> {
            let key = format!("{agent_role}:{skill_name}:{parameters_hash}");
            let by_hash = self.by_hash.lock().unwrap();
            Ok(by_hash
                .get(&key)
                .and_then(|id| self.rows.lock().unwrap().get(id).cloned()))
        }

        async fn start(
            &self,
            agent_role: &str,
            skill_name: &str,
            parameters_hash: &str,
            _params: &Value,
        ) -> Result<TaskRecord, ErrorKind> {
            let id = Uuid::new_v4().to_string();
            let record = TaskRecord {
                id: id.clone(),
                status: TaskStatus::Running,
                result: None,
                error: None,
            };
            let key = format!("{agent_role}:{skill_name}:{parameters_hash}");
            self.by_hash.lock().unwrap().insert(key, id.clone());
            self.rows.lock().unwrap().insert(id, record.clone());
            Ok(record)
        }

        async fn complete(&self, task_id: &str, result: Value) -> Result<(), ErrorKind> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(task_id).unwrap();
            row.status = TaskStatus::Completed;
            row.result = Some(result);
            Ok(())
        }

        async fn fail(&self, task_id: &str, error: &str) -> Result<(), ErrorKind> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(task_id).unwrap();
            row.status = TaskStatus::Failed;
            row.error = Some(error.to_string());
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher {
            agent_role: "retrieval".into(),
            auth: ApiKeyAuth::new("secret"),
            skills: SkillRegistry::new(),
            breakers: Arc::new(BreakerRegistry::new(BreakerConfig::default())),
            tasks: Arc::new(InMemoryTasks::default()),
        }
    }

    fn req(skill: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".into(),
            method: "message/send".into(),
            params: json!({ "skill": skill, "params": params }),
            id: Value::from(1),
        }
    }

    #[tokio::test]
    async fn rejects_missing_auth() {
        let d = dispatcher();
        let response = d.handle(req("echo", json!({})), None).await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn dispatches_and_persists_on_success() {
        let d = dispatcher();
        d.skills.register(Arc::new(Echo)).await;
        let response = d
            .handle(req("echo", json!({"x": 1})), Some("Bearer secret"))
            .await;
        assert_eq!(response.result, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn replays_completed_result_without_recalling_skill() {
        let d = dispatcher();
        d.skills.register(Arc::new(Echo)).await;
        let first = d
            .handle(req("echo", json!({"x": 1})), Some("Bearer secret"))
            .await;
        let second = d
            .handle(req("echo", json!({"x": 1})), Some("Bearer secret"))
            .await;
        assert_eq!(first.result, second.result);
    }

    #[tokio::test]
    async fn reserved_stub_methods_are_unsupported() {
        let d = dispatcher();
        let request = RpcRequest {
            jsonrpc: "2.0".into(),
            method: "message/stream".into(),
            params: Value::Null,
            id: Value::from(1),
        };
        let response = d.handle(request, Some("Bearer secret")).await;
        assert_eq!(response.error.unwrap().code, -32004);
    }
}
