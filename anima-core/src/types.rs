//! Core type definitions shared across the memory engine.
//!
//! All types are serializable; enum wire names are the lowercase
//! snake-case strings stored in metadata lines and documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AnimaError;

// ---------------------------------------------------------------------------
// Identity helpers
// ---------------------------------------------------------------------------

/// Stable integer position of a vector within one similarity index.
///
/// Shared with the metadata record at the same position.
pub type Ordinal = usize;

/// Generate a short prefixed id such as `mem_1a2b3c4d`.
#[must_use]
pub fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..8])
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// A dense embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Width of the vector.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Borrow the raw components.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// Index / source classification
// ---------------------------------------------------------------------------

/// One of the three named similarity indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Durable episodic memories.
    Episodic,
    /// Persona profile chunks and persona facts.
    Persona,
    /// World-knowledge chunks.
    World,
}

impl IndexKind {
    /// All named indices, in scan order.
    pub const ALL: [IndexKind; 3] = [IndexKind::Episodic, IndexKind::Persona, IndexKind::World];

    /// Wire / file name of the index.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Persona => "persona",
            Self::World => "world",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = AnimaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "episodic" => Ok(Self::Episodic),
            "persona" => Ok(Self::Persona),
            "world" => Ok(Self::World),
            other => Err(AnimaError::InvalidInput(format!("unknown index '{other}'"))),
        }
    }
}

/// What kind of domain record a metadata line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// An episodic memory.
    Episodic,
    /// A persona profile chunk.
    Persona,
    /// A single persona fact.
    PersonaFact,
    /// A world-knowledge chunk.
    World,
}

impl SourceType {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Persona => "persona",
            Self::PersonaFact => "persona_fact",
            Self::World => "world",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Memory classification
// ---------------------------------------------------------------------------

/// Storage tier of an episodic memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Short-lived; never vectorized.
    Ephemeral,
    /// Long-term; vectorized into the episodic index.
    Durable,
}

impl MemoryTier {
    /// Classify an importance score against a long-term threshold.
    #[must_use]
    pub fn classify(importance: f32, threshold: f32) -> Self {
        if importance >= threshold {
            Self::Durable
        } else {
            Self::Ephemeral
        }
    }
}

/// Which turn event produced an episodic memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Something the NPC observed.
    Observation,
    /// Something the NPC did.
    Action,
    /// An insight produced by reflection.
    Reflection,
}

impl MemorySource {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Action => "action",
            Self::Reflection => "reflection",
        }
    }
}

// ---------------------------------------------------------------------------
// Persona fact dimensions
// ---------------------------------------------------------------------------

/// The five fixed categories of persona knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactDimension {
    /// Personality characteristics.
    Characteristic,
    /// Routines and habits.
    RoutineHabit,
    /// Goals and plans.
    GoalPlan,
    /// Past experiences.
    Experience,
    /// Relationships with others.
    Relationship,
}

impl FactDimension {
    /// All dimensions, in prompt order.
    pub const ALL: [FactDimension; 5] = [
        FactDimension::Characteristic,
        FactDimension::RoutineHabit,
        FactDimension::GoalPlan,
        FactDimension::Experience,
        FactDimension::Relationship,
    ];

    /// Wire name, also used inside fact embedding text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Characteristic => "characteristic",
            Self::RoutineHabit => "routine_habit",
            Self::GoalPlan => "goal_plan",
            Self::Experience => "experience",
            Self::Relationship => "relationship",
        }
    }

    /// Human-facing heading used when rendering facts into a prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Characteristic => "Character Traits",
            Self::RoutineHabit => "Routines & Habits",
            Self::GoalPlan => "Goals & Plans",
            Self::Experience => "Experiences",
            Self::Relationship => "Relationships",
        }
    }

    /// Parse a dimension name, accepting the loose aliases models produce
    /// (`routine`, `habit`, `goal`, `plan`).
    #[must_use]
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "characteristic" => Some(Self::Characteristic),
            "routine_habit" | "routine" | "habit" => Some(Self::RoutineHabit),
            "goal_plan" | "goal" | "plan" => Some(Self::GoalPlan),
            "experience" => Some(Self::Experience),
            "relationship" => Some(Self::Relationship),
            _ => None,
        }
    }
}

impl fmt::Display for FactDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a persona fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactOrigin {
    /// Seeded from an authored knowledge source.
    Seeded,
    /// Produced by reflection during a turn.
    Reflection,
}

impl FactOrigin {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Reflection => "reflection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_has_prefix_and_eight_hex() {
        let id = short_id("turn");
        assert!(id.starts_with("turn_"));
        assert_eq!(id.len(), "turn_".len() + 8);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tier_threshold_is_inclusive() {
        assert_eq!(MemoryTier::classify(0.7, 0.7), MemoryTier::Durable);
        assert_eq!(MemoryTier::classify(0.69, 0.7), MemoryTier::Ephemeral);
    }

    #[test]
    fn dimension_aliases() {
        assert_eq!(FactDimension::parse_lenient("Habit"), Some(FactDimension::RoutineHabit));
        assert_eq!(FactDimension::parse_lenient(" plan "), Some(FactDimension::GoalPlan));
        assert_eq!(FactDimension::parse_lenient("mood"), None);
    }

    #[test]
    fn index_kind_parses() {
        assert_eq!("World".parse::<IndexKind>().ok(), Some(IndexKind::World));
        assert!("semantic".parse::<IndexKind>().is_err());
    }

    #[test]
    fn source_type_wire_names() {
        let json = serde_json::to_string(&SourceType::PersonaFact).expect("serialize");
        assert_eq!(json, "\"persona_fact\"");
    }
}
