//! Summarise agent process: `summarise_content` (spec §4.1, §4.7).

use kernel::agent_card::{AgentCard, SkillDescriptor};
use kernel::auth::ApiKeyAuth;
use kernel::breaker::BreakerRegistry;
use kernel::config::{AgentRole, Config};
use kernel::dispatch::Dispatcher;
use kernel::http_server::{router, AppState};
use kernel::registry::{heartbeat_loop, RedisRegistry, Registry, ServiceEntry};
use kernel::skill::SkillRegistry;
use sentinel::agents::summarise::SummariseContentSkill;
use sentinel::collaborators::summariser::{ExtractiveSummariser, HttpSummariser, Summariser};
use sentinel::observability::{init_metrics, init_tracing};
use serde_json::json;
use std::sync::Arc;
use store::agent_state_store::AgentStateStore;
use store::dedup_store::DedupStore;
use store::task_store::TaskSinkAdapter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load(AgentRole::Summarise)?;
    init_metrics(config.metrics_port);

    let pool = store::pool::connect(&config.database_url).await?;
    store::pool::migrate(&pool).await?;

    let dedup = DedupStore::new(pool.clone());
    let task_store = store::task_store::TaskStore::new(pool.clone());

    let summariser: Arc<dyn Summariser> = match &config.summariser_url {
        Some(url) => Arc::new(HttpSummariser::new(url.clone())),
        None => Arc::new(ExtractiveSummariser),
    };

    let skills = SkillRegistry::new();
    skills
        .register(Arc::new(SummariseContentSkill {
            summariser,
            extractive: ExtractiveSummariser,
            dedup,
        }))
        .await;

    let base_url = format!("http://0.0.0.0:{}", config.port);
    let agent_card = Arc::new(
        AgentCard::new(
            AgentRole::Summarise.as_str(),
            "Condenses relevant content into alert-ready summaries",
            &base_url,
        )
        .with_skill(SkillDescriptor {
            id: "summarise_content".into(),
            name: "summarise_content".into(),
            description: "Summarise a post, comment, or batch of content".into(),
            tags: vec!["summarise".into()],
            input_modes: vec!["application/json".into()],
            output_modes: vec!["application/json".into()],
            examples: vec![],
            parameters: json!({"type": "object", "required": ["content"]}),
        }),
    );

    let task_sink = Arc::new(TaskSinkAdapter {
        store: task_store,
        workflow_id: uuid::Uuid::new_v4(),
    });

    let dispatcher = Dispatcher {
        agent_role: AgentRole::Summarise.as_str().to_string(),
        auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
        skills,
        breakers: Arc::new(BreakerRegistry::new(config.breaker_for("llm-api"))),
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
            role: AgentRole::Summarise.as_str().to_string(),
            base_url: base_url.clone(),
            skills: vec!["summarise_content".into()],
        };
        tokio::spawn(heartbeat_loop(registry, entry, config.service_discovery_ttl));
    }

    {
        let states = AgentStateStore::new(pool.clone());
        let ttl = config.service_discovery_ttl;
        let skills = json!(["summarise_content"]);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl / 2);
            loop {
                ticker.tick().await;
                if let Err(err) = states.heartbeat(AgentRole::Summarise.as_str(), "healthy", None, &skills).await {
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
    tracing::info!(port = config.port, "summarise agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
