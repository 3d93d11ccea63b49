//! Prompt assembly.
//!
//! Each block is plain text built from store records and retrieval hits.
//! Blocks are independent so they can be checked in isolation; the
//! orchestrator stitches them into the planning template.

use anima_core::memory::{PersonaFact, PersonaProfile, WorldKnowledge};
use anima_core::metadata::truncate_chars;
use anima_core::{FactDimension, RetrievalResult};
use anima_llm::{PromptEngine, PromptId};
use tracing::warn;

/// Render `id`, falling back to the compiled-in template.
pub(crate) fn render_prompt(engine: &PromptEngine, id: PromptId, vars: &[(&str, &str)]) -> (String, String) {
    match engine.render(id, vars) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(prompt = %id, error = %e, "prompt render failed; using built-in template");
            PromptEngine::builtin()
                .render(id, vars)
                .unwrap_or_default()
        }
    }
}

/// Persona profile plus persona facts grouped by dimension.
///
/// Within each dimension, seeded facts come first and learned facts follow
/// with a `(learned)` marker; each list is capped at `max_per_dimension`.
#[must_use]
pub fn persona_block(persona: &PersonaProfile, facts: &[PersonaFact], max_per_dimension: usize) -> String {
    let mut parts = vec![format!("Name: {}", persona.name)];
    let listed = [
        ("Traits", &persona.traits),
        ("Habits", &persona.habits),
        ("Goals", &persona.goals),
    ];
    for (label, items) in listed {
        if !items.is_empty() {
            parts.push(format!("{label}: {}", items.join(", ")));
        }
    }
    if !persona.background.trim().is_empty() {
        parts.push(format!("Background: {}", persona.background));
    }
    if !persona.speech_style.trim().is_empty() {
        parts.push(format!("Speech Style: {}", persona.speech_style));
    }
    for (label, key) in [("Taboos", "taboos"), ("Moral Rules", "moral_rules")] {
        let items = persona.constraint_list(key);
        if !items.is_empty() {
            parts.push(format!("{label}: {}", items.join(", ")));
        }
    }

    let facts = fact_lines(facts, max_per_dimension);
    if !facts.is_empty() {
        parts.push("\nPersona Facts:".to_string());
        parts.extend(facts);
    }
    parts.join("\n")
}

fn fact_lines(facts: &[PersonaFact], cap: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for dimension in FactDimension::ALL {
        let of = |is_static: bool| {
            facts
                .iter()
                .filter(move |f| f.dimension == dimension && f.is_static == is_static)
                .take(cap)
        };
        let seeded: Vec<_> = of(true).collect();
        let learned: Vec<_> = of(false).collect();
        if seeded.is_empty() && learned.is_empty() {
            continue;
        }
        lines.push(format!("{}:", dimension.label()));
        lines.extend(seeded.iter().map(|f| format!("  - {}", f.content)));
        lines.extend(learned.iter().map(|f| format!("  - {} (learned)", f.content)));
    }
    lines
}

/// World title, laws, norms and factions.
#[must_use]
pub fn world_block(world: &WorldKnowledge) -> String {
    let mut parts = vec![format!("World: {}", world.title)];
    let rules = &world.rules;
    if !rules.laws.is_empty() {
        parts.push(format!("Laws: {}", rules.laws.join(", ")));
    }
    if !rules.social_norms.is_empty() {
        parts.push(format!("Social Norms: {}", rules.social_norms.join(", ")));
    }
    if !rules.factions.is_empty() {
        parts.push("Factions:".to_string());
        parts.extend(rules.factions.iter().map(|(name, desc)| format!("  - {name}: {desc}")));
    }
    parts.join("\n")
}

/// Numbered snippets of the top `limit` retrieval hits.
#[must_use]
pub fn memory_block(results: &[RetrievalResult], limit: usize, snippet_chars: usize) -> String {
    if results.is_empty() {
        return "No relevant memories.".to_string();
    }
    let mut parts = vec!["Relevant Memories:".to_string()];
    for (i, hit) in results.iter().take(limit).enumerate() {
        let text = if hit.record.summary.is_empty() {
            hit.record.content.as_deref().unwrap_or_default()
        } else {
            hit.record.summary.as_str()
        };
        parts.push(format!(
            "{}. [{}] {}",
            i + 1,
            hit.record.source_type,
            truncate_chars(text, snippet_chars)
        ));
    }
    parts.join("\n")
}

/// Recent utterances, newest first; empty when there are none.
#[must_use]
pub fn conversation_block(recent: &[String], window: usize) -> String {
    if recent.is_empty() {
        return String::new();
    }
    let mut block = String::from("RECENT CONVERSATION:\n");
    for line in recent.iter().take(window) {
        block.push_str("- ");
        block.push_str(line);
        block.push('\n');
    }
    block
}

/// Reflection insight for the planning prompt; empty without one.
#[must_use]
pub fn reflection_block(summary: Option<&str>) -> String {
    summary.map(|s| format!("REFLECTION: {s}")).unwrap_or_default()
}
