//! World knowledge shared by every NPC living in a world.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Laws, factions, and social norms of a world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRules {
    /// Laws, one statement each.
    #[serde(default)]
    pub laws: Vec<String>,
    /// Faction name → description.
    #[serde(default)]
    pub factions: BTreeMap<String, String>,
    /// Social norms, one statement each.
    #[serde(default)]
    pub social_norms: Vec<String>,
}

/// Static knowledge about a game world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldKnowledge {
    /// Unique identifier.
    pub id: String,
    /// World title.
    pub title: String,
    /// Laws, factions, norms.
    #[serde(default)]
    pub rules: WorldRules,
    /// Location name → free-form description.
    #[serde(default)]
    pub locations: Map<String, Value>,
    /// Danger level per location or region.
    #[serde(default)]
    pub danger_levels: BTreeMap<String, f64>,
    /// Constraints affecting every NPC.
    #[serde(default)]
    pub global_constraints: Map<String, Value>,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorldKnowledge {
    /// An empty world with only an id and title.
    #[must_use]
    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            rules: WorldRules::default(),
            locations: Map::new(),
            danger_levels: BTreeMap::new(),
            global_constraints: Map::new(),
            created_at: Utc::now(),
        }
    }
}
