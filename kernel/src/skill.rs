//! Skill dispatch: `(name, input schema, output schema, handler)` (spec §4.1).
//!
//! Grounded on `server/mcp/src/main.rs`'s `CallToolParams`/tool-name
//! dispatch: a name-keyed map of handlers behind a lock, with
//! `register`/`get`/`list`/`execute` routing. Generalized from "tool" to
//! "skill" and from a fixed MCP result envelope to a plain
//! `Result<Value, ErrorKind>`, since a skill's output shape is defined
//! per-skill rather than by a single fixed envelope.

use crate::error::ErrorKind;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single named, typed handler exposed via `message/send`.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Stable name used in `message/send` dispatch and task rows.
    fn name(&self) -> &str;

    /// Execute the skill body against validated JSON parameters.
    ///
    /// Implementations are pure with respect to `params` except for their
    /// declared side effects on the database and outbound dependency calls
    /// (spec §4.1).
    async fn call(&self, params: Value) -> Result<Value, ErrorKind>;
}

/// Registry of skills for one agent process, keyed by skill name.
#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: Arc<RwLock<HashMap<String, Arc<dyn Skill>>>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a skill, replacing any previous skill under the same name.
    pub async fn register(&self, skill: Arc<dyn Skill>) {
        let mut skills = self.skills.write().await;
        skills.insert(skill.name().to_string(), skill);
    }

    /// Dispatch to the named skill, or `SkillUnknown` if none is registered.
    pub async fn dispatch(&self, name: &str, params: Value) -> Result<Value, ErrorKind> {
        let skill = {
            let skills = self.skills.read().await;
            skills.get(name).cloned()
        };
        match skill {
            Some(skill) => skill.call(params).await,
            None => Err(ErrorKind::SkillUnknown(name.to_string())),
        }
    }

    /// Names of all registered skills, for agent-card assembly.
    pub async fn names(&self) -> Vec<String> {
        let skills = self.skills.read().await;
        skills.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    #[tokio::test]
    async fn dispatches_to_registered_skill() {
        let registry = SkillRegistry::new();
        registry.register(Arc::new(Echo)).await;

        let result = registry.dispatch("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_skill_is_an_error() {
        let registry = SkillRegistry::new();
        let err = registry.dispatch("nonexistent", json!({})).await.unwrap_err();
        assert!(matches!(err, ErrorKind::SkillUnknown(_)));
    }

    #[tokio::test]
    async fn names_reflects_registrations() {
        let registry = SkillRegistry::new();
        registry.register(Arc::new(Echo)).await;
        assert_eq!(registry.names().await, vec!["echo".to_string()]);
    }
}
