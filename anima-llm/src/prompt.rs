//! Prompt templates for the NPC turn.
//!
//! Every prompt is a versioned, testable artifact.  Built-in templates are
//! compiled in; a directory of TOML files can override any of them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::LlmError;

/// System prompt for the planning call.
pub const PLANNING_SYSTEM: &str = r"You are the decision-making mind of a non-player character in a persistent game world.
You act strictly in character, guided by the persona, the world's laws and norms, and the character's memories.

RULES:
- Choose exactly ONE action per turn by calling one of the provided tools.
- Never break character and never mention that you are an AI or a model.
- Respect the character's taboos and moral rules, and the world's laws.
- Prefer actions consistent with the character's goals and relationships.
- If nothing needs to be done, call the `wait` tool.
- In your text reply, give the reason for your choice in 1-2 sentences.";

/// User prompt for the planning call.
pub const PLANNING_USER: &str = r"Decide what the character does next. Use the context below.

PERSONA:
{persona}

WORLD:
{world}

{memories}

{conversation}CURRENT OBSERVATION:
{observation}

{reflection}";

/// System prompt for importance scoring.
pub const IMPORTANCE_SYSTEM: &str = r#"You rate how memorable an event is for a non-player character.

Scale:
- 0.0-0.2: mundane, routine, instantly forgettable (greetings, idling, weather)
- 0.3-0.5: mildly notable (small talk with meaning, minor trades, new faces)
- 0.6-0.8: significant (threats, promises, quests, gifts, relationship shifts)
- 0.9-1.0: life-changing (deaths, betrayals, oaths, attacks on loved ones)

If the action result is not yet available, predict from the observation alone.
Respond with JSON only:
{{"importance_score": <float 0.0-1.0>, "justification": "one short sentence"}}"#;

/// User prompt for importance scoring.
pub const IMPORTANCE_USER: &str = r"OBSERVATION:
{observation}

ACTION RESULT:
{action_result}
{reflection}";

/// System prompt for reflection.
pub const REFLECTION_SYSTEM: &str = r#"You are the inner voice of a non-player character reflecting on what just happened.
Think privately. Connect the observation to past memories. Notice patterns and form opinions.

Propose persona facts only for durable, character-defining knowledge. Valid dimensions:
characteristic, routine_habit, goal_plan, experience, relationship.
Rate each fact's importance honestly; trivial facts must score low.

Respond with JSON only:
{{"insights": "your private thought", "updated_goals": ["goal", ...], "relationship_updates": {{"character_id": "change"}}, "importance_score": <float 0.0-1.0>, "persona_fact_updates": [{{"dimension": "relationship", "content": "fact text", "importance": <float 0.0-1.0>}}]}}"#;

/// User prompt for reflection.
pub const REFLECTION_USER: &str = r"RECENT OBSERVATION:
{observation}

RELEVANT MEMORIES:
{memories}

PERSONA CONTEXT:
Traits: {traits}
Goals: {goals}
";

/// Single-pass template interpolation.
///
/// `{key}` is replaced by its value; unknown keys are left as written;
/// `{{` and `}}` produce literal braces.  Substituted values are never
/// re-scanned, so a value containing `{key}` text is inserted verbatim.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            let replaced = tail[1..].find('}').and_then(|end| {
                let key = &tail[1..=end];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, end + 2))
            });
            match replaced {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// PromptEngine: versioned TOML template loader
// ---------------------------------------------------------------------------

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Action planning with tool calls.
    Planning,
    /// Importance scoring (predicted and precise).
    Importance,
    /// Reflection with persona-fact extraction.
    Reflection,
}

impl PromptId {
    /// All prompt IDs.
    pub const ALL: [PromptId; 3] = [Self::Planning, Self::Importance, Self::Reflection];

    /// The TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::Planning => "planning.toml",
            Self::Importance => "importance.toml",
            Self::Reflection => "reflection.toml",
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::Importance => "importance",
            Self::Reflection => "reflection",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "importance" => Ok(Self::Importance),
            "reflection" => Ok(Self::Reflection),
            _ => Err(LlmError::ConfigError(format!("unknown prompt id: '{s}'"))),
        }
    }
}

/// Metadata and templates parsed from a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

/// Inner `[prompt]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    system: String,
    user: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// System prompt template.
    pub system: String,
    /// User prompt template (contains `{key}` placeholders).
    pub user: String,
}

impl PromptTemplate {
    fn builtin(system: &str, user: &str) -> Self {
        Self {
            version: "builtin".into(),
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Loads versioned prompt templates and renders them.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptEngine {
    /// An engine holding the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(PromptId::Planning, PromptTemplate::builtin(PLANNING_SYSTEM, PLANNING_USER));
        templates.insert(PromptId::Importance, PromptTemplate::builtin(IMPORTANCE_SYSTEM, IMPORTANCE_USER));
        templates.insert(PromptId::Reflection, PromptTemplate::builtin(REFLECTION_SYSTEM, REFLECTION_USER));
        Self { templates }
    }

    /// Built-in templates overridden by any TOML files found in `dir`.
    ///
    /// Files must match a known [`PromptId`] filename; others are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if `dir` does not exist or a file
    /// exists but cannot be read or parsed.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }
        let mut engine = Self::builtin();
        for id in PromptId::ALL {
            let path: PathBuf = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .map_err(|e| LlmError::ConfigError(format!("failed to read {}: {e}", path.display())))?;
            let parsed: TomlPromptFile = toml::from_str(&content)
                .map_err(|e| LlmError::ConfigError(format!("failed to parse {}: {e}", path.display())))?;
            let d = parsed.prompt;
            tracing::info!(prompt = %id, version = %d.version, "loaded prompt override");
            engine.templates.insert(
                id,
                PromptTemplate {
                    version: d.version,
                    system: d.system,
                    user: d.user,
                },
            );
        }
        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render both system and user prompts for a given ID.
    ///
    /// Returns `(system_prompt, user_prompt)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt ID is not loaded.
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<(String, String), LlmError> {
        let tpl = self
            .get(id)
            .ok_or_else(|| LlmError::ConfigError(format!("prompt template '{id}' not loaded")))?;
        Ok((render_template(&tpl.system, vars), render_template(&tpl.user, vars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template(
            "Hello {name}, you are a {role}.",
            &[("name", "Mira"), ("role", "smuggler")],
        );
        assert_eq!(rendered, "Hello Mira, you are a smuggler.");
    }

    #[test]
    fn template_handles_missing_vars_and_escapes() {
        let rendered = render_template("{{\"a\": {x}}} {unknown}", &[("x", "1")]);
        assert_eq!(rendered, "{\"a\": 1} {unknown}");
    }

    #[test]
    fn values_are_not_rescanned() {
        let rendered = render_template("{a} / {b}", &[("a", "{b}"), ("b", "B")]);
        assert_eq!(rendered, "{b} / B");
    }

    #[test]
    fn builtin_json_examples_render_as_json() {
        let engine = PromptEngine::builtin();
        let (system, user) = engine
            .render(
                PromptId::Importance,
                &[("observation", "A wolf appeared"), ("action_result", "{}"), ("reflection", "")],
            )
            .expect("render");
        assert!(system.contains("{\"importance_score\": <float 0.0-1.0>"));
        assert!(user.starts_with("OBSERVATION:\nA wolf appeared\n\nACTION RESULT:\n{}\n"));
    }

    #[test]
    fn prompt_id_parses_display_names() {
        for id in PromptId::ALL {
            assert_eq!(id.to_string().parse::<PromptId>().expect("parse"), id);
        }
        assert!("nonexistent".parse::<PromptId>().is_err());
    }

    #[test]
    fn directory_overrides_only_present_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("importance.toml"),
            "[prompt]\nversion = \"2\"\nsystem = \"Rate it.\"\nuser = \"{observation}\"\n",
        )
        .expect("write");
        let engine = PromptEngine::from_directory(dir.path()).expect("load");
        let imp = engine.get(PromptId::Importance).expect("importance");
        assert_eq!(imp.version, "2");
        assert_eq!(imp.system, "Rate it.");
        assert_eq!(engine.get(PromptId::Planning).expect("planning").version, "builtin");
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(PromptEngine::from_directory("/tmp/nonexistent_anima_prompts_dir").is_err());
    }
}
