//! Alert agent process: `send_slack`, `send_email` (spec §4.1, §4.7).

use kernel::agent_card::{AgentCard, SkillDescriptor};
use kernel::auth::ApiKeyAuth;
use kernel::breaker::BreakerRegistry;
use kernel::config::{AgentRole, Config};
use kernel::dispatch::Dispatcher;
use kernel::http_server::{router, AppState};
use kernel::registry::{heartbeat_loop, RedisRegistry, Registry, ServiceEntry};
use kernel::skill::SkillRegistry;
use sentinel::agents::alert::{SendEmailSkill, SendSlackSkill};
use sentinel::collaborators::notifier::{LettreNotifier, Notifier, ReqwestNotifier};
use sentinel::observability::{init_metrics, init_tracing};
use serde_json::json;
use std::sync::Arc;
use store::agent_state_store::AgentStateStore;
use store::alert_store::AlertStore;
use store::task_store::TaskSinkAdapter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load(AgentRole::Alert)?;
    init_metrics(config.metrics_port);

    let pool = store::pool::connect(&config.database_url).await?;
    store::pool::migrate(&pool).await?;

    let alerts = AlertStore::new(pool.clone());
    let task_store = store::task_store::TaskStore::new(pool.clone());

    let webhook_notifier: Arc<dyn Notifier> = Arc::new(ReqwestNotifier::new(config.webhook.clone()));
    let email_notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(LettreNotifier::new(smtp)?),
        None => {
            tracing::warn!("no SMTP configuration, send_email will always report failure");
            Arc::new(ReqwestNotifier::new(None))
        }
    };

    let skills = SkillRegistry::new();
    skills
        .register(Arc::new(SendSlackSkill {
            notifier: webhook_notifier,
            alerts: alerts.clone(),
            retry: config.retry.clone(),
        }))
        .await;
    skills
        .register(Arc::new(SendEmailSkill {
            notifier: email_notifier,
            alerts,
            retry: config.retry.clone(),
        }))
        .await;

    let base_url = format!("http://0.0.0.0:{}", config.port);
    let agent_card = Arc::new(
        AgentCard::new(AgentRole::Alert.as_str(), "Delivers alert batches over Slack and email", &base_url)
            .with_skill(SkillDescriptor {
                id: "send_slack".into(),
                name: "send_slack".into(),
                description: "Deliver an alert batch to Slack".into(),
                tags: vec!["alert".into()],
                input_modes: vec!["application/json".into()],
                output_modes: vec!["application/json".into()],
                examples: vec![],
                parameters: json!({"type": "object", "required": ["batch_ref"]}),
            })
            .with_skill(SkillDescriptor {
                id: "send_email".into(),
                name: "send_email".into(),
                description: "Deliver an alert batch by email".into(),
                tags: vec!["alert".into()],
                input_modes: vec!["application/json".into()],
                output_modes: vec!["application/json".into()],
                examples: vec![],
                parameters: json!({"type": "object", "required": ["batch_ref", "recipients"]}),
            }),
    );

    let task_sink = Arc::new(TaskSinkAdapter {
        store: task_store,
        workflow_id: uuid::Uuid::new_v4(),
    });

    let dispatcher = Dispatcher {
        agent_role: AgentRole::Alert.as_str().to_string(),
        auth: ApiKeyAuth::new(config.a2a_api_key.clone()),
        skills,
        breakers: Arc::new(BreakerRegistry::new(config.breaker_for("alert"))),
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
            role: AgentRole::Alert.as_str().to_string(),
            base_url: base_url.clone(),
            skills: vec!["send_slack".into(), "send_email".into()],
        };
        tokio::spawn(heartbeat_loop(registry, entry, config.service_discovery_ttl));
    }

    {
        let states = AgentStateStore::new(pool.clone());
        let ttl = config.service_discovery_ttl;
        let skills = json!(["send_slack", "send_email"]);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl / 2);
            loop {
                ticker.tick().await;
                if let Err(err) = states.heartbeat(AgentRole::Alert.as_str(), "healthy", None, &skills).await {
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
    tracing::info!(port = config.port, "alert agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
