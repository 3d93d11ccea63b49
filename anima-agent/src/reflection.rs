//! Reflection — when to introspect, and what to keep from it.
//!
//! The trigger is a pure decision over [`ReflectionSignals`].  The
//! reflection call itself never fails a turn: unusable output is turned
//! into a plain-text insight.  Candidate persona facts are filtered by
//! stated importance and deduplicated before anything is stored.

use std::sync::Arc;

use anima_core::memory::persona::contains_content;
use anima_core::memory::{PersonaFact, PersonaProfile};
use anima_core::metadata::truncate_chars;
use anima_core::{FactDimension, RetrievalResult};
use anima_llm::parse::parse_json;
use anima_llm::types::FactUpdate;
use anima_llm::{ChatMessage, CompletionService, PromptEngine, PromptId, ReflectionOutput};
use serde_json::Map;
use tracing::{debug, warn};

use crate::context::render_prompt;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Valence of an emotion label; unknown labels are neutral.
#[must_use]
pub fn emotion_valence(label: &str) -> f32 {
    match label.trim().to_lowercase().as_str() {
        "happy" => 0.3,
        "excited" => 0.5,
        "sad" => -0.3,
        "angry" => -0.5,
        "fearful" => -0.4,
        "surprised" => 0.2,
        // calm, neutral, anything else
        _ => 0.0,
    }
}

/// Signed valence change from `previous` to `current`.
#[must_use]
pub fn emotion_delta(previous: &str, current: &str) -> f32 {
    emotion_valence(current) - emotion_valence(previous)
}

/// Everything the trigger looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReflectionSignals {
    /// Observation-only importance estimate.
    pub predicted_importance: f32,
    /// The observation signals a relationship change.
    pub relationship_changed: bool,
    /// The observation concerns a quest.
    pub quest_changed: bool,
    /// Signed emotional-valence change.
    pub emotion_delta: f32,
    /// A caller asked for reflection outright.
    pub explicit_request: bool,
}

/// Thresholds for the reflection trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionTrigger {
    /// Predicted importance at or above which to reflect.
    pub importance_threshold: f32,
    /// Minimum absolute valence swing that forces reflection.
    pub emotion_delta_threshold: f32,
}

impl Default for ReflectionTrigger {
    fn default() -> Self {
        Self {
            importance_threshold: 0.7,
            emotion_delta_threshold: 0.3,
        }
    }
}

impl ReflectionTrigger {
    /// Whether any condition calls for reflection.
    #[must_use]
    pub fn should_reflect(&self, signals: &ReflectionSignals) -> bool {
        signals.explicit_request
            || signals.predicted_importance >= self.importance_threshold
            || signals.relationship_changed
            || signals.quest_changed
            || signals.emotion_delta.abs() >= self.emotion_delta_threshold
    }
}

// ---------------------------------------------------------------------------
// Reflection call
// ---------------------------------------------------------------------------

/// Insight used when the model produced nothing usable.
pub const NO_INSIGHTS: &str = "No insights extracted";

const FALLBACK_INSIGHT_CHARS: usize = 200;
const MEMORY_SUMMARY_CHARS: usize = 100;

/// Parse a reflection reply; unusable text becomes the insight itself.
#[must_use]
pub fn parse_reflection(raw: &str) -> ReflectionOutput {
    match parse_json::<ReflectionOutput>(raw) {
        Ok(mut out) => {
            out.importance_score = out.importance_score.clamp(0.0, 1.0);
            out
        }
        Err(e) => {
            warn!(error = %e, "unparseable reflection; keeping raw text as insight");
            let trimmed = raw.trim();
            let insights = if trimmed.is_empty() {
                NO_INSIGHTS.to_string()
            } else {
                truncate_chars(trimmed, FALLBACK_INSIGHT_CHARS).to_string()
            };
            ReflectionOutput {
                insights,
                updated_goals: Vec::new(),
                relationship_updates: Map::new(),
                importance_score: 0.5,
                persona_fact_updates: Vec::new(),
            }
        }
    }
}

/// Runs the reflection prompt.
pub struct Reflector {
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptEngine>,
    max_memories: usize,
}

impl Reflector {
    /// Create a reflector that shows at most `max_memories` summaries.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionService>, prompts: Arc<PromptEngine>, max_memories: usize) -> Self {
        Self {
            llm,
            prompts,
            max_memories,
        }
    }

    /// Reflect on an observation in light of retrieved memories.
    pub async fn reflect(
        &self,
        observation_summary: &str,
        memories: &[RetrievalResult],
        persona: &PersonaProfile,
    ) -> ReflectionOutput {
        let memory_lines: Vec<String> = memories
            .iter()
            .take(self.max_memories)
            .map(|m| format!("- {}", truncate_chars(&m.record.summary, MEMORY_SUMMARY_CHARS)))
            .collect();
        let memory_text = if memory_lines.is_empty() {
            "None".to_string()
        } else {
            memory_lines.join("\n")
        };
        let traits = persona.traits.join(", ");
        let goals = persona.goals.join(", ");
        let (system, user) = render_prompt(
            &self.prompts,
            PromptId::Reflection,
            &[
                ("observation", observation_summary),
                ("memories", &memory_text),
                ("traits", &traits),
                ("goals", &goals),
            ],
        );
        let reply = match self
            .llm
            .call_simple(&[ChatMessage::system(system), ChatMessage::user(user)])
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "reflection call failed; continuing without insights");
                String::new()
            }
        };
        let out = parse_reflection(&reply);
        debug!(
            importance = out.importance_score,
            candidate_facts = out.persona_fact_updates.len(),
            "reflection complete"
        );
        out
    }
}

// ---------------------------------------------------------------------------
// Fact acceptance
// ---------------------------------------------------------------------------

/// Turn candidate updates into new dynamic facts.
///
/// A candidate is kept when its stated importance is at least
/// `importance_threshold`, its dimension parses, its content is non-blank,
/// and its content matches no existing fact (nor an earlier candidate)
/// case- and whitespace-insensitively.
#[must_use]
pub fn accept_fact_updates(
    persona_id: &str,
    npc_id: &str,
    updates: &[FactUpdate],
    existing: &[PersonaFact],
    importance_threshold: f32,
) -> Vec<PersonaFact> {
    let mut accepted: Vec<PersonaFact> = Vec::new();
    for update in updates {
        if update.importance < importance_threshold {
            debug!(importance = update.importance, "fact below threshold; skipped");
            continue;
        }
        let Some(dimension) = FactDimension::parse_lenient(&update.dimension) else {
            debug!(dimension = %update.dimension, "unknown fact dimension; skipped");
            continue;
        };
        let content = update.content.trim();
        if content.is_empty() {
            continue;
        }
        if contains_content(existing, content) || contains_content(&accepted, content) {
            debug!(content, "duplicate fact; skipped");
            continue;
        }
        accepted.push(PersonaFact::learned(
            persona_id,
            Some(npc_id.to_string()),
            dimension,
            content,
        ));
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_llm::ScriptedCompletionService;

    fn update(dimension: &str, content: &str, importance: f32) -> FactUpdate {
        FactUpdate {
            dimension: dimension.into(),
            content: content.into(),
            importance,
        }
    }

    #[test]
    fn calm_to_angry_crosses_the_delta_threshold() {
        let delta = emotion_delta("calm", "angry");
        assert!((delta + 0.5).abs() < f32::EPSILON);
        let signals = ReflectionSignals {
            predicted_importance: 0.1,
            emotion_delta: delta,
            ..ReflectionSignals::default()
        };
        assert!(ReflectionTrigger::default().should_reflect(&signals));
    }

    #[test]
    fn quiet_turn_does_not_reflect() {
        let signals = ReflectionSignals {
            predicted_importance: 0.69,
            emotion_delta: emotion_delta("neutral", "surprised"),
            ..ReflectionSignals::default()
        };
        assert!(!ReflectionTrigger::default().should_reflect(&signals));
    }

    #[test]
    fn delta_exactly_at_threshold_reflects() {
        let signals = ReflectionSignals {
            predicted_importance: 0.1,
            emotion_delta: emotion_delta("neutral", "happy"),
            ..ReflectionSignals::default()
        };
        assert!(ReflectionTrigger::default().should_reflect(&signals));
    }

    #[test]
    fn each_signal_triggers_alone() {
        let trigger = ReflectionTrigger::default();
        for signals in [
            ReflectionSignals { predicted_importance: 0.7, ..Default::default() },
            ReflectionSignals { relationship_changed: true, ..Default::default() },
            ReflectionSignals { quest_changed: true, ..Default::default() },
            ReflectionSignals { explicit_request: true, ..Default::default() },
        ] {
            assert!(trigger.should_reflect(&signals), "{signals:?}");
        }
    }

    #[test]
    fn unknown_emotions_are_neutral() {
        assert!(emotion_valence("melancholic").abs() < f32::EPSILON);
        assert!((emotion_valence(" Excited ") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn unparseable_reflection_keeps_raw_text() {
        let out = parse_reflection("I should keep an eye on the stranger.");
        assert_eq!(out.insights, "I should keep an eye on the stranger.");
        assert!(out.persona_fact_updates.is_empty());
        assert_eq!(parse_reflection("   ").insights, NO_INSIGHTS);
    }

    #[test]
    fn facts_below_threshold_are_never_created() {
        let updates = vec![
            update("relationship", "player_1 betrayed me", 0.79),
            update("experience", "I survived the fire", 0.8),
        ];
        let facts = accept_fact_updates("p1", "npc_1", &updates, &[], 0.8);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].dimension, FactDimension::Experience);
        assert!(!facts[0].is_static);
        assert_eq!(facts[0].npc_id.as_deref(), Some("npc_1"));
    }

    #[test]
    fn duplicates_and_bad_dimensions_are_dropped() {
        let existing = vec![PersonaFact::seeded("p1", None, FactDimension::Characteristic, "I am brave")];
        let updates = vec![
            update("characteristic", "  I AM BRAVE ", 0.9),
            update("habit", "I pray at dusk", 0.9),
            update("Habit", "i pray at dusk", 0.95),
            update("mood", "I am tired", 0.9),
            update("goal", "   ", 0.9),
        ];
        let facts = accept_fact_updates("p1", "npc_1", &updates, &existing, 0.8);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "I pray at dusk");
        assert_eq!(facts[0].dimension, FactDimension::RoutineHabit);
    }

    #[tokio::test]
    async fn reflect_renders_persona_and_survives_llm_failure() {
        let llm = Arc::new(ScriptedCompletionService::new());
        let dyn_llm: Arc<dyn CompletionService> = llm.clone();
        let reflector = Reflector::new(dyn_llm, Arc::new(PromptEngine::builtin()), 5);
        let mut persona = PersonaProfile::named("p1", "Mira");
        persona.traits = vec!["wary".into(), "loyal".into()];

        let out = reflector.reflect("player_1 lies", &[], &persona).await;
        assert_eq!(out.insights, NO_INSIGHTS);
        let prompt = llm.calls()[0].user_prompt().to_string();
        assert!(prompt.contains("Traits: wary, loyal"));
        assert!(prompt.contains("RELEVANT MEMORIES:\nNone"));
    }
}
