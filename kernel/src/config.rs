//! Process configuration, loaded once at boot from the environment.
//!
//! Each binary calls [`Config::load`] exactly once in `main()` and threads
//! the resulting value explicitly into its agent constructor. There is no
//! process-wide mutable singleton — the same stance `server/gateway/src/main.rs`
//! takes with its `ServerConfig`: built once from CLI flags and
//! environment via `noa_server_core::config`, then passed down explicitly
//! rather than read from a global.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// One agent role in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Coordinator,
    Retrieval,
    Filter,
    Summarise,
    Alert,
}

impl AgentRole {
    /// Stable string form used as the registry key suffix and DB column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Retrieval => "retrieval",
            AgentRole::Filter => "filter",
            AgentRole::Summarise => "summarise",
            AgentRole::Alert => "alert",
        }
    }

    /// Default listening port for this role (spec §6).
    pub fn default_port(&self) -> u16 {
        match self {
            AgentRole::Coordinator => 8000,
            AgentRole::Retrieval => 8001,
            AgentRole::Filter => 8002,
            AgentRole::Summarise => 8003,
            AgentRole::Alert => 8004,
        }
    }
}

/// Per-dependency circuit breaker configuration (spec §4.3).
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub call_timeout: Duration,
    pub half_open_max_concurrent: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            call_timeout: Duration::from_secs(10),
            half_open_max_concurrent: 3,
        }
    }
}

/// Bounded retry configuration (spec §4.5).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub factor: f64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_attempts: 3,
        }
    }
}

/// SMTP settings consumed by the Alert agent's `Notifier` (spec §6).
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Webhook settings consumed by the Alert agent's `Notifier`.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
}

/// Full process configuration for a single agent instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: AgentRole,
    pub port: u16,
    pub database_url: String,
    pub registry_url: String,
    pub a2a_api_key: String,
    /// `role -> base URL`, used by the Coordinator and recovery daemon to
    /// reach peers before/alongside registry discovery.
    pub peer_urls: HashMap<String, String>,
    pub monitoring_topics: Vec<String>,
    pub monitoring_interval: Duration,
    pub relevance_threshold: f64,
    pub keyword_weight: f64,
    pub semantic_weight: f64,
    pub batch_max_items: usize,
    pub service_discovery_ttl: Duration,
    pub peer_unavailable_budget: Duration,
    pub skill_timeout: Duration,
    pub breakers: HashMap<String, BreakerConfig>,
    pub retry: RetryConfig,
    pub smtp: Option<SmtpConfig>,
    pub webhook: Option<WebhookConfig>,
    /// Base URL of the discussion-platform HTTP stand-in consumed by the
    /// Retrieval agent's `ContentSource` (spec §6, out of scope for the
    /// real platform client).
    pub content_source_url: String,
    /// Base URL of a hosted summarisation endpoint. `None` means the
    /// Summarise agent runs extractive-only.
    pub summariser_url: Option<String>,
    /// Prometheus exporter listen port (SPEC_FULL.md ambient-stack section).
    pub metrics_port: u16,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration for `role` from the process environment,
    /// reading a local `.env` file first via `dotenvy` if one is present.
    pub fn load(role: AgentRole) -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let port = env_parse("PORT", role.default_port());

        let peer_urls = [
            AgentRole::Coordinator,
            AgentRole::Retrieval,
            AgentRole::Filter,
            AgentRole::Summarise,
            AgentRole::Alert,
        ]
        .into_iter()
        .map(|r| {
            let env_key = format!("{}_URL", r.as_str().to_uppercase());
            let default = format!("http://127.0.0.1:{}", r.default_port());
            (r.as_str().to_string(), env_or(&env_key, &default))
        })
        .collect();

        let monitoring_topics = env_or("MONITORING_TOPICS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut breakers = HashMap::new();
        for dep in ["reddit-api", "llm-api", "database"] {
            breakers.insert(dep.to_string(), BreakerConfig::default());
        }
        for role in [
            AgentRole::Coordinator,
            AgentRole::Retrieval,
            AgentRole::Filter,
            AgentRole::Summarise,
            AgentRole::Alert,
        ] {
            breakers.insert(role.as_str().to_string(), BreakerConfig::default());
        }

        let smtp = std::env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587u16),
            username: env_or("SMTP_USERNAME", ""),
            password: env_or("SMTP_PASSWORD", ""),
            from_address: env_or("SMTP_FROM", "monitoring@localhost"),
        });

        let webhook = std::env::var("WEBHOOK_URL")
            .ok()
            .map(|url| WebhookConfig { url });

        Ok(Self {
            role,
            port,
            database_url: env_or("DATABASE_URL", "postgres://localhost/sentinel"),
            registry_url: env_or("REGISTRY_URL", "redis://127.0.0.1:6379"),
            a2a_api_key: env_or("A2A_API_KEY", ""),
            peer_urls,
            monitoring_topics,
            monitoring_interval: Duration::from_secs(
                env_parse::<u64>("MONITORING_INTERVAL_HOURS", 4) * 3600,
            ),
            relevance_threshold: env_parse("RELEVANCE_THRESHOLD", 0.7),
            keyword_weight: env_parse("KEYWORD_WEIGHT", 0.4),
            semantic_weight: env_parse("SEMANTIC_WEIGHT", 0.6),
            batch_max_items: env_parse("BATCH_MAX_ITEMS", 20usize),
            service_discovery_ttl: Duration::from_secs(env_parse(
                "SERVICE_DISCOVERY_TTL_SECONDS",
                30,
            )),
            peer_unavailable_budget: Duration::from_secs(env_parse(
                "PEER_UNAVAILABLE_BUDGET_SECONDS",
                300,
            )),
            skill_timeout: Duration::from_secs(env_parse("SKILL_TIMEOUT_SECONDS", 60)),
            breakers,
            retry: RetryConfig::default(),
            smtp,
            webhook,
            content_source_url: env_or("CONTENT_SOURCE_URL", "http://127.0.0.1:9100"),
            summariser_url: std::env::var("SUMMARISER_URL").ok(),
            metrics_port: env_parse("METRICS_PORT", 9000u16),
        })
    }

    /// Look up the breaker config for a named dependency, falling back to
    /// defaults if the operator hasn't overridden it.
    pub fn breaker_for(&self, name: &str) -> BreakerConfig {
        self.breakers.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_spec_table() {
        assert_eq!(AgentRole::Coordinator.default_port(), 8000);
        assert_eq!(AgentRole::Retrieval.default_port(), 8001);
        assert_eq!(AgentRole::Filter.default_port(), 8002);
        assert_eq!(AgentRole::Summarise.default_port(), 8003);
        assert_eq!(AgentRole::Alert.default_port(), 8004);
    }

    #[test]
    fn breaker_default_matches_spec_range() {
        let cfg = BreakerConfig::default();
        assert!(cfg.failure_threshold >= 3 && cfg.failure_threshold <= 5);
        assert!(cfg.success_threshold >= 1 && cfg.success_threshold <= 3);
    }
}
