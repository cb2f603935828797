//! Retrieval agent process: `fetch_posts`, `fetch_comments`,
//! `discover_communities` (spec §4.1, §4.7).

use kernel::agent_card::{AgentCard, SkillDescriptor};
use kernel::auth::ApiKeyAuth;
use kernel::breaker::BreakerRegistry;
use kernel::config::{AgentRole, Config};
use kernel::dispatch::Dispatcher;
use kernel::http_server::{router, AppState};
use kernel::registry::{heartbeat_loop, RedisRegistry, Registry, ServiceEntry};
use kernel::skill::SkillRegistry;
use sentinel::collaborators::content_source::HttpContentSource;
use sentinel::observability::{init_metrics, init_tracing};
use serde_json::json;
use std::sync::Arc;
use store::agent_state_store::AgentStateStore;
use store::content_store::ContentStore;
use store::task_store::TaskSinkAdapter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load(AgentRole::Retrieval)?;
    init_metrics(config.metrics_port);

    let pool = store::pool::connect(&config.database_url).await?;
    store::pool::migrate(&pool).await?;

    let content_store = ContentStore::new(pool.clone());
    let task_store = store::task_store::TaskStore::new(pool.clone());
    let source = Arc::new(HttpContentSource::new(config.content_source_url.clone()));

    let skills = SkillRegistry::new();
    skills
        .register(Arc::new(sentinel::agents::retrieval::FetchPostsSkill::new(
            source.clone(),
            content_store.clone(),
            config.retry.clone(),
        )))
        .await;
    skills
        .register(Arc::new(sentinel::agents::retrieval::FetchCommentsSkill {
            source: source.clone(),
            content_store: content_store.clone(),
            retry: config.retry.clone(),
        }))
        .await;
    skills
        .register(Arc::new(sentinel::agents::retrieval::DiscoverCommunitiesSkill {
            source,
            content_store,
        }))
        .await;

    let base_url = format!("http://0.0.0.0:{}", config.port);
    let agent_card = Arc::new(
        AgentCard::new(
            AgentRole::Retrieval.as_str(),
            "Discovers and fetches posts, comments, and communities from the monitored platform",
            &base_url,
        )
        .with_skill(SkillDescriptor {
            id: "fetch_posts".into(),
            name: "fetch_posts".into(),
            description: "Fetch recent posts for a topic".into(),
            tags: vec!["retrieval".into()],
            input_modes: vec!["application/json".into()],
            output_modes: vec!["application/json".into()],
            examples: vec![],
            parameters: json!({"type": "object", "required": ["topic"]}),
        })
        .with_skill(SkillDescriptor {
            id: "fetch_comments".into(),
            name: "fetch_comments".into(),
            description: "Fetch comments for a post".into(),
            tags: vec!["retrieval".into()],
            input_modes: vec!["application/json".into()],
            output_modes: vec!["application/json".into()],
            examples: vec![],
            parameters: json!({"type": "object", "required": ["post_id"]}),
        })
        .with_skill(SkillDescriptor {
            id: "discover_communities".into(),
            name: "discover_communities".into(),
            description: "Discover communities relevant to a topic".into(),
            tags: vec!["retrieval".into()],
            input_modes: vec!["application/json".into()],
            output_modes: vec!["application/json".into()],
            examples: vec![],
            parameters: json!({"type": "object", "required": ["topic"]}),
        }),
    );

    let task_sink = Arc::new(TaskSinkAdapter {
        store: task_store,
        workflow_id: uuid::Uuid::new_v4(),
    });

    let dispatcher = Dispatcher {
        agent_role: AgentRole::Retrieval.as_str().to_string(),
        auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
        skills,
        breakers: Arc::new(BreakerRegistry::new(config.breaker_for("reddit-api"))),
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
            role: AgentRole::Retrieval.as_str().to_string(),
            base_url: base_url.clone(),
            skills: vec![
                "fetch_posts".into(),
                "fetch_comments".into(),
                "discover_communities".into(),
            ],
        };
        let ttl = config.service_discovery_ttl;
        tokio::spawn(heartbeat_loop(registry, entry, ttl));
    }

    {
        let states = AgentStateStore::new(pool.clone());
        let ttl = config.service_discovery_ttl;
        let skills = json!(["fetch_posts", "fetch_comments", "discover_communities"]);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl / 2);
            loop {
                ticker.tick().await;
                if let Err(err) = states.heartbeat(AgentRole::Retrieval.as_str(), "healthy", None, &skills).await {
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
    tracing::info!(port = config.port, "retrieval agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
