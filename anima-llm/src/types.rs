//! Core types for completion requests, tool calls, and structured model
//! output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions.
    System,
    /// Caller content.
    User,
    /// Model output.
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Function name; doubles as the action type.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    /// OpenAI function-calling representation.
    #[must_use]
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A tool invocation returned by the model.
///
/// `arguments` is the raw JSON text exactly as the model produced it; it
/// may be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id.
    #[serde(default)]
    pub id: String,
    /// Function name.
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

/// Result of a tool-enabled completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutput {
    /// Free text accompanying (or instead of) tool calls.
    pub text: String,
    /// Tool invocations, in model order.
    pub tool_calls: Vec<ToolCall>,
    /// Provider finish reason, if reported.
    pub finish_reason: Option<String>,
}

impl CompletionOutput {
    /// Text-only output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Output with a single tool call.
    #[must_use]
    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_0".into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
            finish_reason: Some("tool_calls".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured model output
// ---------------------------------------------------------------------------

fn default_half() -> f32 {
    0.5
}

fn default_justification() -> String {
    "No justification provided".to_string()
}

/// Importance judgement returned by the scoring prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceVerdict {
    /// Score in \[0, 1\] (clamped by the caller).
    #[serde(default = "default_half")]
    pub importance_score: f32,
    /// One-line reason.
    #[serde(default = "default_justification")]
    pub justification: String,
}

/// A persona fact proposed by reflection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactUpdate {
    /// Dimension name as written by the model; parsed leniently.
    #[serde(default)]
    pub dimension: String,
    /// Fact text.
    #[serde(default)]
    pub content: String,
    /// Model-stated importance.
    #[serde(default)]
    pub importance: f32,
}

/// Structured reflection returned by the reflection prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionOutput {
    /// The NPC's private insight.
    #[serde(default)]
    pub insights: String,
    /// Revised goals.
    #[serde(default)]
    pub updated_goals: Vec<String>,
    /// Relationship changes keyed by character id.
    #[serde(default)]
    pub relationship_updates: Map<String, Value>,
    /// Importance of the insight itself.
    #[serde(default = "default_half")]
    pub importance_score: f32,
    /// Candidate persona facts.
    #[serde(default)]
    pub persona_fact_updates: Vec<FactUpdate>,
}
