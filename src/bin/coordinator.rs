//! Coordinator process: drives the monitoring-cycle workflow state machine
//! and the recovery daemon (spec §4.1, §4.5, §4.6). Exposes no skills of
//! its own; `/health` and `/discover` are still served for operability.

use kernel::agent_card::AgentCard;
use kernel::auth::ApiKeyAuth;
use kernel::breaker::BreakerRegistry;
use kernel::config::{AgentRole, Config};
use kernel::dispatch::Dispatcher;
use kernel::http_server::{router, AppState};
use kernel::registry::{heartbeat_loop, RedisRegistry, Registry, ServiceEntry};
use kernel::skill::SkillRegistry;
use sentinel::agents::coordinator::Coordinator;
use sentinel::observability::{init_metrics, init_tracing};
use std::sync::Arc;
use std::time::Duration;
use store::agent_state_store::AgentStateStore;
use store::alert_store::AlertStore;
use store::content_store::ContentStore;
use store::lock_store::LockStore;
use store::task_store::{TaskSinkAdapter, TaskStore};
use store::workflow_store::WorkflowStore;

const RECOVERY_TICK: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load(AgentRole::Coordinator)?;
    init_metrics(config.metrics_port);

    let pool = store::pool::connect(&config.database_url).await?;
    store::pool::migrate(&pool).await?;

    let registry: Option<Arc<dyn Registry>> = match RedisRegistry::connect(&config.registry_url).await {
        Ok(r) => Some(Arc::new(r)),
        Err(err) => {
            tracing::warn!(%err, "registry unavailable, coordinator will rely on static peer URLs");
            None
        }
    };

    let coordinator = Arc::new(Coordinator::new(
        config.clone(),
        LockStore::new(pool.clone()),
        WorkflowStore::new(pool.clone()),
        TaskStore::new(pool.clone()),
        ContentStore::new(pool.clone()),
        AlertStore::new(pool.clone()),
        registry.clone(),
    ));

    if let Ok(Some(resumable)) = coordinator.workflows.resumable().await {
        tracing::info!(workflow_id = %resumable.id, stage = %resumable.current_stage, "resuming in-flight workflow from checkpoint on restart");
    }

    {
        let coordinator = coordinator.clone();
        let interval_duration = config.monitoring_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval_duration);
            loop {
                ticker.tick().await;
                if let Err(err) = coordinator.run_cycle().await {
                    tracing::error!(%err, "monitoring cycle failed");
                }
            }
        });
    }

    {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RECOVERY_TICK);
            loop {
                ticker.tick().await;
                if let Err(err) = coordinator.recover_due_tasks().await {
                    tracing::warn!(%err, "recovery daemon tick failed");
                }
            }
        });
    }

    let base_url = format!("http://0.0.0.0:{}", config.port);
    let agent_card = Arc::new(AgentCard::new(
        AgentRole::Coordinator.as_str(),
        "Drives the monitoring-cycle workflow across Retrieval, Filter, Summarise, and Alert",
        &base_url,
    ));

    let task_sink = Arc::new(TaskSinkAdapter {
        store: TaskStore::new(pool.clone()),
        workflow_id: uuid::Uuid::new_v4(),
    });

    let dispatcher = Dispatcher {
        agent_role: AgentRole::Coordinator.as_str().to_string(),
        auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
        skills: SkillRegistry::new(),
        breakers: Arc::new(BreakerRegistry::new(config.breaker_for("coordinator"))),
        tasks: task_sink,
    };

    if let Some(registry) = registry.clone() {
        let entry = ServiceEntry {
            role: AgentRole::Coordinator.as_str().to_string(),
            base_url: base_url.clone(),
            skills: vec![],
        };
        tokio::spawn(heartbeat_loop(registry, entry, config.service_discovery_ttl));
    }

    {
        let states = AgentStateStore::new(pool.clone());
        let ttl = config.service_discovery_ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl / 2);
            loop {
                ticker.tick().await;
                if let Err(err) = states
                    .heartbeat(AgentRole::Coordinator.as_str(), "healthy", None, &serde_json::json!([]))
                    .await
                {
                    tracing::warn!(%err, "durable heartbeat upsert failed");
                }
            }
        });
    }

    let state = AppState {
        dispatcher,
        agent_card,
        registry,
        discover_auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "coordinator listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
