//! Filter agent process: `filter_content` (spec §4.1, §4.7).

use kernel::agent_card::{AgentCard, SkillDescriptor};
use kernel::auth::ApiKeyAuth;
use kernel::breaker::BreakerRegistry;
use kernel::config::{AgentRole, Config};
use kernel::dispatch::Dispatcher;
use kernel::http_server::{router, AppState};
use kernel::registry::{heartbeat_loop, RedisRegistry, Registry, ServiceEntry};
use kernel::skill::SkillRegistry;
use sentinel::agents::filter::FilterContentSkill;
use sentinel::collaborators::embedder::HashingEmbedder;
use sentinel::observability::{init_metrics, init_tracing};
use serde_json::json;
use std::sync::Arc;
use store::agent_state_store::AgentStateStore;
use store::content_store::ContentStore;
use store::task_store::TaskSinkAdapter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load(AgentRole::Filter)?;
    init_metrics(config.metrics_port);

    let pool = store::pool::connect(&config.database_url).await?;
    store::pool::migrate(&pool).await?;

    let content_store = ContentStore::new(pool.clone());
    let task_store = store::task_store::TaskStore::new(pool.clone());

    let skills = SkillRegistry::new();
    skills
        .register(Arc::new(FilterContentSkill::new(
            Arc::new(HashingEmbedder),
            content_store,
            config.keyword_weight,
            config.semantic_weight,
            config.relevance_threshold,
        )))
        .await;

    let base_url = format!("http://0.0.0.0:{}", config.port);
    let agent_card = Arc::new(
        AgentCard::new(
            AgentRole::Filter.as_str(),
            "Scores retrieved content against monitored topics for relevance",
            &base_url,
        )
        .with_skill(SkillDescriptor {
            id: "filter_content".into(),
            name: "filter_content".into(),
            description: "Score items against topics using keyword and semantic signals".into(),
            tags: vec!["filter".into()],
            input_modes: vec!["application/json".into()],
            output_modes: vec!["application/json".into()],
            examples: vec![],
            parameters: json!({"type": "object", "required": ["items", "topics"]}),
        }),
    );

    let task_sink = Arc::new(TaskSinkAdapter {
        store: task_store,
        workflow_id: uuid::Uuid::new_v4(),
    });

    let dispatcher = Dispatcher {
        agent_role: AgentRole::Filter.as_str().to_string(),
        auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
        skills,
        breakers: Arc::new(BreakerRegistry::new(config.breaker_for("filter"))),
        tasks: task_sink,
    };

    let registry: Option<Arc<dyn Registry>> = match RedisRegistry::connect(&config.registry_url).await {
        Ok(r) => Some(Arc::new(r)),
        Err(err) => {
            tracing::warn!(%err, "registry unavailable, running without service discovery");
            None
        }
    };
    if let Some(registry) = registry.clone() {
        let entry = ServiceEntry {
            role: AgentRole::Filter.as_str().to_string(),
            base_url: base_url.clone(),
            skills: vec!["filter_content".into()],
        };
        tokio::spawn(heartbeat_loop(registry, entry, config.service_discovery_ttl));
    }

    {
        let states = AgentStateStore::new(pool.clone());
        let ttl = config.service_discovery_ttl;
        let skills = json!(["filter_content"]);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl / 2);
            loop {
                ticker.tick().await;
                if let Err(err) = states.heartbeat(AgentRole::Filter.as_str(), "healthy", None, &skills).await {
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
    tracing::info!(port = config.port, "filter agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
