//! Relevant-dimension inference for persona-fact boosting.
//!
//! [`DimensionClassifier`] is the seam; [`KeywordDimensionClassifier`] is
//! the built-in heuristic.  Keywords match as lowercase substrings of the
//! query, and the observation's event type contributes its own dimensions.

use std::collections::BTreeSet;

use crate::types::FactDimension;

/// Infers which persona-fact dimensions a query is about.
pub trait DimensionClassifier: Send + Sync {
    /// Dimensions relevant to `query_text`, optionally informed by the
    /// current observation's event type.
    fn classify(&self, query_text: &str, event_type: Option<&str>) -> BTreeSet<FactDimension>;
}

const CHARACTERISTIC: &[&str] = &[
    "brave", "coward", "wise", "foolish", "kind", "cruel", "patient", "impatient", "protective",
    "selfish", "honest", "deceptive",
];
const ROUTINE_HABIT: &[&str] = &[
    "always", "usually", "often", "routine", "habit", "regularly", "consistently", "typically",
    "normally",
];
const GOAL_PLAN: &[&str] = &[
    "goal", "want", "plan", "intend", "aim", "purpose", "objective", "strive", "seek", "desire",
    "wish",
];
const EXPERIENCE: &[&str] = &[
    "remember", "recall", "learned", "experienced", "happened", "before", "past", "memory",
];
const RELATIONSHIP: &[&str] = &[
    "friend", "enemy", "ally", "mentor", "student", "relationship", "trust", "betray", "help",
    "support", "oppose",
];

const EVENT_RULES: &[(&str, FactDimension)] = &[
    ("combat", FactDimension::Characteristic),
    ("fight", FactDimension::Characteristic),
    ("attack", FactDimension::Characteristic),
    ("talk", FactDimension::Relationship),
    ("dialogue", FactDimension::Relationship),
    ("conversation", FactDimension::Relationship),
    ("quest", FactDimension::GoalPlan),
];

/// Keyword-vocabulary classifier.
#[derive(Debug, Clone)]
pub struct KeywordDimensionClassifier {
    vocabularies: Vec<(FactDimension, Vec<String>)>,
    event_rules: Vec<(String, FactDimension)>,
}

impl Default for KeywordDimensionClassifier {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| (*w).to_string()).collect::<Vec<_>>();
        Self {
            vocabularies: vec![
                (FactDimension::Characteristic, owned(CHARACTERISTIC)),
                (FactDimension::RoutineHabit, owned(ROUTINE_HABIT)),
                (FactDimension::GoalPlan, owned(GOAL_PLAN)),
                (FactDimension::Experience, owned(EXPERIENCE)),
                (FactDimension::Relationship, owned(RELATIONSHIP)),
            ],
            event_rules: EVENT_RULES
                .iter()
                .map(|(needle, dim)| ((*needle).to_string(), *dim))
                .collect(),
        }
    }
}

impl KeywordDimensionClassifier {
    /// Replace the vocabulary for one dimension.
    #[must_use]
    pub fn with_vocabulary(mut self, dimension: FactDimension, words: &[&str]) -> Self {
        let words: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        match self.vocabularies.iter_mut().find(|(d, _)| *d == dimension) {
            Some((_, existing)) => *existing = words,
            None => self.vocabularies.push((dimension, words)),
        }
        self
    }

    /// Add an event-type substring rule.
    #[must_use]
    pub fn with_event_rule(mut self, needle: &str, dimension: FactDimension) -> Self {
        self.event_rules.push((needle.to_lowercase(), dimension));
        self
    }
}

impl DimensionClassifier for KeywordDimensionClassifier {
    fn classify(&self, query_text: &str, event_type: Option<&str>) -> BTreeSet<FactDimension> {
        let query = query_text.to_lowercase();
        let mut dims: BTreeSet<FactDimension> = self
            .vocabularies
            .iter()
            .filter(|(_, words)| words.iter().any(|w| query.contains(w.as_str())))
            .map(|(dim, _)| *dim)
            .collect();

        if let Some(event) = event_type {
            let event = event.to_lowercase();
            dims.extend(
                self.event_rules
                    .iter()
                    .filter(|(needle, _)| event.contains(needle.as_str()))
                    .map(|(_, dim)| *dim),
            );
        }
        dims
    }
}
