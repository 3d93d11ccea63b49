//! Persona profiles and persona facts.
//!
//! A profile is the authored description of a character.  Facts are
//! individual statements tagged with a [`FactDimension`]; static facts are
//! seeded once, dynamic ones are learned through reflection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{short_id, FactDimension, FactOrigin};

/// Authored persona description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Personality traits.
    #[serde(default)]
    pub traits: Vec<String>,
    /// Behavioural habits.
    #[serde(default)]
    pub habits: Vec<String>,
    /// Long-term goals.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Background story.
    #[serde(default)]
    pub background: String,
    /// How the persona speaks.
    #[serde(default)]
    pub speech_style: String,
    /// Relationship summaries keyed by other NPC id.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    /// Free-form constraints (`taboos`, `moral_rules`, ...).
    #[serde(default)]
    pub constraints: Map<String, Value>,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PersonaProfile {
    /// A profile with only an id and a name.
    #[must_use]
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            traits: Vec::new(),
            habits: Vec::new(),
            goals: Vec::new(),
            background: String::new(),
            speech_style: String::new(),
            relationships: BTreeMap::new(),
            constraints: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// String items under `constraints[key]`, ignoring non-string entries.
    #[must_use]
    pub fn constraint_list(&self, key: &str) -> Vec<String> {
        self.constraints
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One persona fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaFact {
    /// Unique identifier (`fact_xxxxxxxx`).
    pub id: String,
    /// Owning persona.
    pub persona_id: String,
    /// Owning NPC; `None` means shared by every NPC using the persona.
    #[serde(default)]
    pub npc_id: Option<String>,
    /// Knowledge category.
    pub dimension: FactDimension,
    /// Natural language content.
    pub content: String,
    /// Provenance.
    pub origin: FactOrigin,
    /// Seeded facts are static; reflection facts are not.
    pub is_static: bool,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PersonaFact {
    /// A static fact seeded from authored material.
    #[must_use]
    pub fn seeded(
        persona_id: impl Into<String>,
        npc_id: Option<String>,
        dimension: FactDimension,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: short_id("fact"),
            persona_id: persona_id.into(),
            npc_id,
            dimension,
            content: content.into(),
            origin: FactOrigin::Seeded,
            is_static: true,
            created_at: Utc::now(),
        }
    }

    /// A dynamic fact learned through reflection.
    #[must_use]
    pub fn learned(
        persona_id: impl Into<String>,
        npc_id: Option<String>,
        dimension: FactDimension,
        content: impl Into<String>,
    ) -> Self {
        Self {
            origin: FactOrigin::Reflection,
            is_static: false,
            ..Self::seeded(persona_id, npc_id, dimension, content)
        }
    }

    /// Text embedded for this fact; the dimension tag takes part in
    /// similarity, not just in filtering.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("[{}] persona fact: {}", self.dimension, self.content)
    }
}

/// Case- and whitespace-insensitive key for dedup.
///
/// Runs of whitespace collapse to one space.
#[must_use]
pub fn dedup_key(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Whether `content` already exists among `facts` after normalisation.
#[must_use]
pub fn contains_content(facts: &[PersonaFact], content: &str) -> bool {
    let key = dedup_key(content);
    facts.iter().any(|f| dedup_key(&f.content) == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_carries_dimension() {
        let fact = PersonaFact::seeded("p1", None, FactDimension::RoutineHabit, "I rise at dawn");
        assert_eq!(fact.embedding_text(), "[routine_habit] persona fact: I rise at dawn");
    }

    #[test]
    fn learned_facts_are_dynamic() {
        let fact = PersonaFact::learned("p1", Some("npc_1".into()), FactDimension::Experience, "x");
        assert!(!fact.is_static);
        assert_eq!(fact.origin, FactOrigin::Reflection);
        assert!(fact.id.starts_with("fact_"));
    }

    #[test]
    fn dedup_ignores_case_and_padding() {
        let facts = vec![PersonaFact::seeded("p1", None, FactDimension::Characteristic, "I am Brave")];
        assert!(contains_content(&facts, "  i am brave "));
        assert!(!contains_content(&facts, "i am bold"));
    }

    #[test]
    fn dedup_collapses_inner_whitespace() {
        let facts = vec![PersonaFact::seeded("p1", None, FactDimension::RoutineHabit, "likes bread")];
        assert!(contains_content(&facts, "likes  bread"));
        assert!(contains_content(&facts, "Likes\tBread\n"));
        assert_eq!(dedup_key(" likes \n  bread "), "likes bread");
    }

    #[test]
    fn constraint_list_reads_string_arrays() {
        let mut persona = PersonaProfile::named("p1", "Mira");
        persona.constraints.insert(
            "taboos".into(),
            serde_json::json!(["lying", 3, "theft"]),
        );
        assert_eq!(persona.constraint_list("taboos"), vec!["lying", "theft"]);
        assert!(persona.constraint_list("moral_rules").is_empty());
    }
}
