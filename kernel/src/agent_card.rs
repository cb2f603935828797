//! Agent-card descriptor served at `/.well-known/agent.json` (spec §6).
//!
//! Field shape is grounded on `agents/src/unified_types.rs`'s `AgentMetadata`
//! (layer, category, capability descriptors serialized straight through
//! serde), applied here at the skill level rather than the agent-directory
//! level.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider/organization block of an agent card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub organization: String,
    pub url: String,
}

/// A single skill entry advertised in an agent card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
    pub examples: Vec<String>,
    /// JSON-schema-shaped parameter description.
    pub parameters: Value,
}

/// Static self-description returned by every agent's `/.well-known/agent.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
    pub provider: Provider,
    pub skills: Vec<SkillDescriptor>,
}

impl AgentCard {
    pub fn new(name: impl Into<String>, description: impl Into<String>, base_url: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: format!("{base_url}/a2a"),
            provider: Provider {
                organization: "monitoring-pipeline".to_string(),
                url: base_url.to_string(),
            },
            skills: Vec::new(),
        }
    }

    pub fn with_skill(mut self, skill: SkillDescriptor) -> Self {
        self.skills.push(skill);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_is_mounted_at_a2a() {
        let card = AgentCard::new("retrieval", "fetches posts and comments", "http://host:8001");
        assert_eq!(card.url, "http://host:8001/a2a");
    }

    #[test]
    fn skills_accumulate_in_order() {
        let card = AgentCard::new("filter", "scores relevance", "http://host:8002")
            .with_skill(SkillDescriptor {
                id: "filter_content".into(),
                name: "filter_content".into(),
                description: "score items against topics".into(),
                tags: vec!["filter".into()],
                input_modes: vec!["application/json".into()],
                output_modes: vec!["application/json".into()],
                examples: vec![],
                parameters: json!({"type": "object"}),
            });
        assert_eq!(card.skills.len(), 1);
        assert_eq!(card.skills[0].id, "filter_content");
    }
}
