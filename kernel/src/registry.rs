//! Service registry client: register-with-TTL, heartbeat, discover (spec §4.2).
//!
//! New code, wrapping one external system behind a narrow trait the way
//! `server/gateway/src/main.rs` wraps its `redis::Client` behind
//! application-level calls rather than threading the raw connection
//! through business logic: `Registry` is the trait agents program
//! against, `RedisRegistry` is the one production implementation, backed
//! by the same `redis` crate and `tokio-comp`/`connection-manager`
//! features the gateway binary builds its `RedisClient` with.

use crate::error::ErrorKind;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry in the registry: an agent instance advertising where it can
/// be reached and what it can do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEntry {
    pub role: String,
    pub base_url: String,
    pub skills: Vec<String>,
}

/// Narrow interface over the service registry, so callers never depend on
/// `redis` directly.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Register (or refresh) this instance's entry with a fresh TTL.
    async fn register(&self, entry: &ServiceEntry, ttl: Duration) -> Result<(), ErrorKind>;

    /// Look up the current entry for `role`, if any instance is live.
    async fn discover(&self, role: &str) -> Result<Option<ServiceEntry>, ErrorKind>;

    /// All currently-registered roles (for the `/discover` listing endpoint).
    async fn discover_all(&self) -> Result<Vec<ServiceEntry>, ErrorKind>;
}

fn registry_key(role: &str) -> String {
    format!("sentinel:registry:{role}")
}

/// Redis-backed implementation: one string key per role, `SET ... EX ttl`.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    pub async fn connect(redis_url: &str) -> Result<Self, ErrorKind> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ErrorKind::Fatal(format!("invalid registry url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ErrorKind::Transient(format!("connecting to registry: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Registry for RedisRegistry {
    async fn register(&self, entry: &ServiceEntry, ttl: Duration) -> Result<(), ErrorKind> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| ErrorKind::Fatal(format!("serialising registry entry: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(registry_key(&entry.role), payload, ttl.as_secs().max(1))
            .await
            .map_err(|e| ErrorKind::Transient(format!("registering {}: {e}", entry.role)))
    }

    async fn discover(&self, role: &str) -> Result<Option<ServiceEntry>, ErrorKind> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(registry_key(role))
            .await
            .map_err(|e| ErrorKind::Transient(format!("discovering {role}: {e}")))?;
        match raw {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| ErrorKind::Fatal(format!("corrupt registry entry for {role}: {e}"))),
            None => Ok(None),
        }
    }

    async fn discover_all(&self) -> Result<Vec<ServiceEntry>, ErrorKind> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys("sentinel:registry:*")
            .await
            .map_err(|e| ErrorKind::Transient(format!("listing registry keys: {e}")))?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| ErrorKind::Transient(format!("reading {key}: {e}")))?;
            if let Some(payload) = raw {
                let entry: ServiceEntry = serde_json::from_str(&payload)
                    .map_err(|e| ErrorKind::Fatal(format!("corrupt registry entry {key}: {e}")))?;
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Spawn the heartbeat loop: re-register at half the TTL, forever, logging
/// (not panicking) on transient registry failures (spec §4.2).
pub async fn heartbeat_loop<R: Registry + 'static>(
    registry: std::sync::Arc<R>,
    entry: ServiceEntry,
    ttl: Duration,
) {
    let interval = ttl / 2;
    loop {
        if let Err(err) = registry.register(&entry, ttl).await {
            tracing::warn!(role = %entry.role, error = %err, "heartbeat registration failed");
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct InMemoryRegistry {
        entries: Mutex<std::collections::HashMap<String, ServiceEntry>>,
    }

    #[async_trait]
    impl Registry for InMemoryRegistry {
        async fn register(&self, entry: &ServiceEntry, _ttl: Duration) -> Result<(), ErrorKind> {
            self.entries
                .lock()
                .unwrap()
                .insert(entry.role.clone(), entry.clone());
            Ok(())
        }

        async fn discover(&self, role: &str) -> Result<Option<ServiceEntry>, ErrorKind> {
            Ok(self.entries.lock().unwrap().get(role).cloned())
        }

        async fn discover_all(&self) -> Result<Vec<ServiceEntry>, ErrorKind> {
            Ok(self.entries.lock().unwrap().values().cloned().collect())
        }
    }

    #[tokio::test]
    async fn register_then_discover_round_trips() {
        let registry = InMemoryRegistry::default();
        let entry = ServiceEntry {
            role: "retrieval".into(),
            base_url: "http://127.0.0.1:8001".into(),
            skills: vec!["fetch_posts".into()],
        };
        registry.register(&entry, Duration::from_secs(30)).await.unwrap();
        let found = registry.discover("retrieval").await.unwrap();
        assert_eq!(found, Some(entry));
    }

    #[tokio::test]
    async fn discover_missing_role_returns_none() {
        let registry = InMemoryRegistry::default();
        assert_eq!(registry.discover("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn heartbeat_loop_keeps_registering() {
        let registry = Arc::new(InMemoryRegistry::default());
        let entry = ServiceEntry {
            role: "filter".into(),
            base_url: "http://127.0.0.1:8002".into(),
            skills: vec!["filter_content".into()],
        };
        let handle = tokio::spawn(heartbeat_loop(
            registry.clone(),
            entry.clone(),
            Duration::from_millis(20),
        ));
        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.abort();
        assert_eq!(registry.discover("filter").await.unwrap(), Some(entry));
    }
}
