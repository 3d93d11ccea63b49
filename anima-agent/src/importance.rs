//! Importance scoring.
//!
//! Two calls share one prompt: a cheap prediction from the observation
//! alone, used only to decide whether to reflect, and a precise score once
//! the action result is known.  Both degrade to 0.5 instead of failing.

use std::sync::Arc;

use anima_llm::parse::parse_json;
use anima_llm::{ChatMessage, CompletionService, ImportanceVerdict, LlmError, PromptEngine, PromptId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::render_prompt;

/// Action-result text used when predicting.
pub const PREDICTION_PLACEHOLDER: &str = "(Not yet available - prediction only)";

/// Score used whenever the model's answer is unusable.
pub const FALLBACK_SCORE: f32 = 0.5;

/// Justification paired with [`FALLBACK_SCORE`] for unparseable output.
pub const FALLBACK_JUSTIFICATION: &str = "Failed to parse importance score";

/// A clamped importance score with its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceScore {
    /// Score in \[0, 1\].
    pub score: f32,
    /// One-line reason.
    pub justification: String,
}

impl ImportanceScore {
    fn fallback(justification: impl Into<String>) -> Self {
        Self {
            score: FALLBACK_SCORE,
            justification: justification.into(),
        }
    }
}

/// Parse a scoring reply into a clamped score.
///
/// # Errors
///
/// Returns [`LlmError::ParseError`] if the reply is not the expected JSON.
pub fn parse_importance(raw: &str) -> Result<ImportanceScore, LlmError> {
    let verdict: ImportanceVerdict = parse_json(raw)?;
    Ok(ImportanceScore {
        score: verdict.importance_score.clamp(0.0, 1.0),
        justification: verdict.justification,
    })
}

/// LLM-backed importance scorer.
pub struct ImportanceScorer {
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptEngine>,
}

impl ImportanceScorer {
    /// Create a scorer.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionService>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    async fn ask(&self, observation: &str, action_result: &str, reflection: &str) -> Result<String, LlmError> {
        let (system, user) = render_prompt(
            &self.prompts,
            PromptId::Importance,
            &[
                ("observation", observation),
                ("action_result", action_result),
                ("reflection", reflection),
            ],
        );
        self.llm
            .call_simple(&[ChatMessage::system(system), ChatMessage::user(user)])
            .await
    }

    /// Predict importance from the observation alone.
    pub async fn predict(&self, observation_summary: &str) -> f32 {
        let reply = match self.ask(observation_summary, PREDICTION_PLACEHOLDER, "").await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "importance prediction call failed; using fallback");
                return FALLBACK_SCORE;
            }
        };
        match parse_importance(&reply) {
            Ok(s) => {
                debug!(predicted = s.score, "importance predicted");
                s.score
            }
            Err(e) => {
                warn!(error = %e, "unparseable importance prediction; using fallback");
                FALLBACK_SCORE
            }
        }
    }

    /// Score importance with the actual action result and any reflection.
    pub async fn score(
        &self,
        observation_summary: &str,
        action_result: &Value,
        reflection_summary: Option<&str>,
    ) -> ImportanceScore {
        let result_text =
            serde_json::to_string_pretty(action_result).unwrap_or_else(|_| action_result.to_string());
        let reflection = reflection_summary
            .map(|r| format!("\nREFLECTION:\n{r}\n"))
            .unwrap_or_default();
        let reply = match self.ask(observation_summary, &result_text, &reflection).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "importance scoring call failed; using fallback");
                return ImportanceScore::fallback(format!("Importance scoring unavailable: {e}"));
            }
        };
        parse_importance(&reply).unwrap_or_else(|e| {
            warn!(error = %e, "unparseable importance score; using fallback");
            ImportanceScore::fallback(FALLBACK_JUSTIFICATION)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_llm::ScriptedCompletionService;
    use serde_json::json;

    fn scorer(llm: ScriptedCompletionService) -> (ImportanceScorer, Arc<ScriptedCompletionService>) {
        let llm = Arc::new(llm);
        let dyn_llm: Arc<dyn CompletionService> = llm.clone();
        (ImportanceScorer::new(dyn_llm, Arc::new(PromptEngine::builtin())), llm)
    }

    #[test]
    fn scores_are_clamped() {
        let s = parse_importance(r#"{"importance_score": 1.8, "justification": "huge"}"#).expect("parse");
        assert!((s.score - 1.0).abs() < f32::EPSILON);
        assert_eq!(s.justification, "huge");
    }

    #[test]
    fn fenced_json_is_accepted() {
        let s = parse_importance("```json\n{\"importance_score\": 0.25}\n```").expect("parse");
        assert!((s.score - 0.25).abs() < f32::EPSILON);
        assert_eq!(s.justification, "No justification provided");
    }

    #[tokio::test]
    async fn prediction_uses_placeholder_and_falls_back() {
        let (scorer, llm) = scorer(ScriptedCompletionService::new().with_simple("not json"));
        assert!((scorer.predict("player_1 waves").await - FALLBACK_SCORE).abs() < f32::EPSILON);
        let calls = llm.calls();
        assert!(calls[0].user_prompt().contains(PREDICTION_PLACEHOLDER));
        assert!(!calls[0].user_prompt().contains("REFLECTION"));
    }

    #[tokio::test]
    async fn precise_score_sees_result_and_reflection() {
        let (scorer, llm) = scorer(
            ScriptedCompletionService::new()
                .with_simple(r#"{"importance_score": 0.9, "justification": "a betrayal"}"#),
        );
        let s = scorer
            .score("player_1 steals", &json!({"success": true}), Some("Insights: trust no one"))
            .await;
        assert!((s.score - 0.9).abs() < f32::EPSILON);
        let prompt = llm.calls()[0].user_prompt().to_string();
        assert!(prompt.contains("\"success\": true"));
        assert!(prompt.contains("REFLECTION:\nInsights: trust no one"));
    }

    #[tokio::test]
    async fn unparseable_score_gets_documented_default() {
        let (scorer, _) = scorer(ScriptedCompletionService::new().with_simple("eh"));
        let s = scorer.score("x", &json!({}), None).await;
        assert!((s.score - FALLBACK_SCORE).abs() < f32::EPSILON);
        assert_eq!(s.justification, FALLBACK_JUSTIFICATION);
    }
}
