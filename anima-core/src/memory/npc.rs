//! NPC records and per-NPC turn configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AnimaConfig;

/// Mutable state carried on an NPC between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcState {
    /// Current emotion label (`calm`, `angry`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    /// Current goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Current location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Hit points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i64>,
    /// Status flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_flags: Vec<String>,
    /// Anything else the game attaches.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-NPC overrides of the global turn settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcConfig {
    /// Hits requested per index.
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,
    /// Long-term threshold for this NPC's memories.
    #[serde(default = "default_threshold")]
    pub importance_threshold: f32,
    /// Predicted importance that triggers reflection.
    #[serde(default = "default_threshold")]
    pub reflection_threshold: f32,
    /// Facts rendered per dimension in the planning prompt.
    #[serde(default = "default_max_facts")]
    pub max_facts_per_dimension: usize,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: default_top_k(),
            importance_threshold: default_threshold(),
            reflection_threshold: default_threshold(),
            max_facts_per_dimension: default_max_facts(),
        }
    }
}

impl NpcConfig {
    /// Defaults drawn from the global configuration.
    #[must_use]
    pub fn from_global(config: &AnimaConfig) -> Self {
        Self {
            retrieval_top_k: config.retrieval.default_top_k,
            importance_threshold: config.memory.long_term_threshold,
            reflection_threshold: config.reflection.importance_threshold,
            max_facts_per_dimension: default_max_facts(),
        }
    }
}

fn default_top_k() -> usize { 5 }
fn default_threshold() -> f32 { 0.7 }
fn default_max_facts() -> usize { 3 }

/// A non-player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role in the world.
    pub role: String,
    /// Persona this NPC embodies.
    pub persona_id: String,
    /// World this NPC lives in.
    pub world_id: String,
    /// Mutable state.
    #[serde(default)]
    pub current_state: NpcState,
    /// Optional per-NPC overrides.
    #[serde(default)]
    pub config: Option<NpcConfig>,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Npc {
    /// Build an NPC with empty state and no overrides.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        persona_id: impl Into<String>,
        world_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            persona_id: persona_id.into(),
            world_id: world_id.into(),
            current_state: NpcState::default(),
            config: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective turn settings: the NPC's overrides or the global defaults.
    #[must_use]
    pub fn effective_config(&self, global: &AnimaConfig) -> NpcConfig {
        self.config
            .clone()
            .unwrap_or_else(|| NpcConfig::from_global(global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_keeps_unknown_fields() {
        let state: NpcState = serde_json::from_value(serde_json::json!({
            "emotion": "calm",
            "goal": "guard the gate",
            "mana": 12
        }))
        .expect("valid state");
        assert_eq!(state.emotion.as_deref(), Some("calm"));
        assert_eq!(state.extra.get("mana"), Some(&serde_json::json!(12)));
    }

    #[test]
    fn effective_config_prefers_override() {
        let global = AnimaConfig::default();
        let mut npc = Npc::new("npc_1", "Bran", "guard", "p1", "w1");
        assert_eq!(npc.effective_config(&global).retrieval_top_k, 5);
        npc.config = Some(NpcConfig {
            retrieval_top_k: 9,
            ..NpcConfig::default()
        });
        assert_eq!(npc.effective_config(&global).retrieval_top_k, 9);
    }
}
