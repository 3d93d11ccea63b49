//! Prompt Quality Evaluation — Golden Test Set.
//!
//! A curated set of template + variables → expectations, checking that the
//! turn prompts render into well-formed text: context blocks present,
//! placeholders resolved, JSON instructions intact.
//!
//! Run with `cargo test -p anima-llm --test eval_golden`.

use anima_llm::prompt::{self, PromptEngine, PromptId};

/// A golden test case for prompt evaluation.
struct GoldenCase {
    /// Human-readable name for the test case.
    name: &'static str,
    /// Which prompt template constant to use.
    template: &'static str,
    /// Template variables to fill in.
    vars: Vec<(&'static str, &'static str)>,
    /// Strings that MUST appear in the rendered prompt.
    prompt_must_contain: Vec<&'static str>,
    /// Strings that MUST NOT appear in the rendered prompt.
    prompt_must_not_contain: Vec<&'static str>,
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        // ---------------------------------------------------------------
        // 1. Planning: guard confronted by a thief
        // ---------------------------------------------------------------
        GoldenCase {
            name: "guard_planning_with_memories",
            template: prompt::PLANNING_USER,
            vars: vec![
                ("persona", "Name: Bram\nTraits: dutiful, stern"),
                ("world", "World: Eldoria\nLaws: No theft"),
                ("memories", "Relevant Memories:\n1. [episodic] The thief escaped last week"),
                ("conversation", "RECENT CONVERSATION:\n- player_1 talk to Bram at gate\n"),
                ("observation", "player_1 steal to/with merchant at market"),
                ("reflection", "REFLECTION: Insights: The same thief is back."),
            ],
            prompt_must_contain: vec![
                "PERSONA:\nName: Bram",
                "WORLD:\nWorld: Eldoria",
                "1. [episodic] The thief escaped",
                "RECENT CONVERSATION:",
                "CURRENT OBSERVATION:\nplayer_1 steal",
                "REFLECTION: Insights:",
            ],
            prompt_must_not_contain: vec!["{persona}", "{world}", "{reflection}", "{conversation}"],
        },
        // ---------------------------------------------------------------
        // 2. Planning: idle turn, nothing remembered
        // ---------------------------------------------------------------
        GoldenCase {
            name: "idle_planning_without_context",
            template: prompt::PLANNING_USER,
            vars: vec![
                ("persona", "Name: Mira"),
                ("world", "World: Vale"),
                ("memories", "No relevant memories."),
                ("conversation", ""),
                ("observation", "unknown did something"),
                ("reflection", ""),
            ],
            prompt_must_contain: vec!["No relevant memories.", "CURRENT OBSERVATION:\nunknown did something"],
            prompt_must_not_contain: vec!["RECENT CONVERSATION", "REFLECTION", "{memories}"],
        },
        // ---------------------------------------------------------------
        // 3. Planning system prompt carries the tool rule
        // ---------------------------------------------------------------
        GoldenCase {
            name: "planning_system_rules",
            template: prompt::PLANNING_SYSTEM,
            vars: vec![],
            prompt_must_contain: vec!["ONE action", "`wait` tool", "Never break character"],
            prompt_must_not_contain: vec!["{{", "}}"],
        },
        // ---------------------------------------------------------------
        // 4. Importance: prediction before the action exists
        // ---------------------------------------------------------------
        GoldenCase {
            name: "importance_prediction",
            template: prompt::IMPORTANCE_USER,
            vars: vec![
                ("observation", "player_1 attack to/with Bram at gate"),
                ("action_result", "(Not yet available - prediction only)"),
                ("reflection", ""),
            ],
            prompt_must_contain: vec![
                "OBSERVATION:\nplayer_1 attack",
                "ACTION RESULT:\n(Not yet available - prediction only)",
            ],
            prompt_must_not_contain: vec!["REFLECTION", "{action_result}"],
        },
        // ---------------------------------------------------------------
        // 5. Importance: precise score with reflection
        // ---------------------------------------------------------------
        GoldenCase {
            name: "importance_with_reflection",
            template: prompt::IMPORTANCE_USER,
            vars: vec![
                ("observation", "player_1 give_item to/with Bram at gate"),
                ("action_result", "{\n  \"success\": true\n}"),
                ("reflection", "\nREFLECTION:\nInsights: A bribe?\n"),
            ],
            prompt_must_contain: vec!["\"success\": true", "REFLECTION:\nInsights: A bribe?"],
            prompt_must_not_contain: vec!["{reflection}"],
        },
        // ---------------------------------------------------------------
        // 6. Importance system prompt renders its JSON example
        // ---------------------------------------------------------------
        GoldenCase {
            name: "importance_system_json",
            template: prompt::IMPORTANCE_SYSTEM,
            vars: vec![],
            prompt_must_contain: vec!["{\"importance_score\"", "\"justification\""],
            prompt_must_not_contain: vec!["{{"],
        },
        // ---------------------------------------------------------------
        // 7. Reflection: memories and persona context
        // ---------------------------------------------------------------
        GoldenCase {
            name: "reflection_user_context",
            template: prompt::REFLECTION_USER,
            vars: vec![
                ("observation", "player_1 betray to/with Mira at docks"),
                ("memories", "- Mira trusted player_1 with the cargo"),
                ("traits", "wary, loyal"),
                ("goals", "protect the crew"),
            ],
            prompt_must_contain: vec![
                "RECENT OBSERVATION:\nplayer_1 betray",
                "RELEVANT MEMORIES:\n- Mira trusted",
                "Traits: wary, loyal",
                "Goals: protect the crew",
            ],
            prompt_must_not_contain: vec!["{traits}", "{goals}"],
        },
        // ---------------------------------------------------------------
        // 8. Reflection: no memories retrieved
        // ---------------------------------------------------------------
        GoldenCase {
            name: "reflection_without_memories",
            template: prompt::REFLECTION_USER,
            vars: vec![
                ("observation", "unknown did something"),
                ("memories", "None"),
                ("traits", ""),
                ("goals", ""),
            ],
            prompt_must_contain: vec!["RELEVANT MEMORIES:\nNone"],
            prompt_must_not_contain: vec!["{memories}"],
        },
        // ---------------------------------------------------------------
        // 9. Reflection system prompt lists every dimension
        // ---------------------------------------------------------------
        GoldenCase {
            name: "reflection_system_dimensions",
            template: prompt::REFLECTION_SYSTEM,
            vars: vec![],
            prompt_must_contain: vec![
                "characteristic",
                "routine_habit",
                "goal_plan",
                "experience",
                "relationship",
                "\"persona_fact_updates\": [{\"dimension\"",
            ],
            prompt_must_not_contain: vec!["{{"],
        },
        // ---------------------------------------------------------------
        // 10. Values containing braces stay verbatim
        // ---------------------------------------------------------------
        GoldenCase {
            name: "observation_with_braces",
            template: prompt::IMPORTANCE_USER,
            vars: vec![
                ("observation", "player_1 says \"{reflection}\" to/with Bram"),
                ("action_result", "{}"),
                ("reflection", "SHOULD-NOT-LEAK"),
            ],
            prompt_must_contain: vec!["says \"{reflection}\""],
            prompt_must_not_contain: vec!["says \"SHOULD-NOT-LEAK\""],
        },
    ]
}

// ---------------------------------------------------------------------------
// Offline Tests: Template Rendering Validation
// ---------------------------------------------------------------------------

#[test]
fn golden_prompts_render_as_expected() {
    for case in &golden_cases() {
        let rendered = prompt::render_template(case.template, &case.vars);

        for needle in &case.prompt_must_contain {
            assert!(
                rendered.contains(needle),
                "Golden case '{}': rendered prompt must contain '{}' but doesn't.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }

        for needle in &case.prompt_must_not_contain {
            assert!(
                !rendered.contains(needle),
                "Golden case '{}': rendered prompt must NOT contain '{}' but does.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
    }
}

#[test]
fn golden_set_has_minimum_coverage() {
    let cases = golden_cases();
    assert!(cases.len() >= 10, "Golden set must have at least 10 test cases, got {}", cases.len());
}

#[test]
fn structured_prompts_request_json() {
    for (name, template) in [
        ("importance", prompt::IMPORTANCE_SYSTEM),
        ("reflection", prompt::REFLECTION_SYSTEM),
    ] {
        assert!(template.contains("JSON"), "System prompt '{name}' must instruct the LLM to return JSON");
    }
}

#[test]
fn builtin_engine_covers_every_prompt() {
    let engine = PromptEngine::builtin();
    for id in PromptId::ALL {
        let tpl = engine.get(id).expect("template loaded");
        assert!(tpl.system.contains("You "), "System prompt '{id}' must address the model");
        assert!(!tpl.user.is_empty());
    }
}
