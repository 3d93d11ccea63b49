//! Tools — the actions an NPC can take.
//!
//! A [`Tool`] is either one of the closed set of [`BuiltinTool`]s or a
//! [`DynamicTool`] registered at runtime and run by the [`sandbox`].
//! Dispatch is a match on that enum.  Every execution yields an
//! [`ActionResult`]; a failing tool is a failed result, never an error.

pub mod builtin;
pub mod registry;
pub mod sandbox;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use anima_llm::ToolSpec;

pub use builtin::BuiltinTool;
pub use registry::ToolRegistry;
pub use sandbox::{CodeHandle, Sandbox};

/// An action chosen by planning or forced by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Tool name (`talk`, `move_to`, ...).
    pub action_type: String,
    /// Tool arguments.
    pub arguments: Map<String, Value>,
    /// Why the action was chosen.
    pub reason: String,
}

impl Action {
    /// A `wait` action with `reason` as its only argument.
    #[must_use]
    pub fn wait(argument_reason: &str, reason: impl Into<String>) -> Self {
        let mut arguments = Map::new();
        arguments.insert("reason".into(), Value::String(argument_reason.into()));
        Self {
            action_type: builtin::WAIT.into(),
            arguments,
            reason: reason.into(),
        }
    }
}

/// Outcome of executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action took effect.
    pub success: bool,
    /// Tool that ran.
    pub action_type: String,
    /// Engine-agnostic description of what changed.
    pub effect: Map<String, Value>,
    /// Failure reason; empty on success.
    #[serde(default)]
    pub error: String,
}

impl ActionResult {
    /// A successful result.
    #[must_use]
    pub fn ok(action_type: &str, effect: Map<String, Value>) -> Self {
        Self {
            success: true,
            action_type: action_type.into(),
            effect,
            error: String::new(),
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(action_type: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action_type: action_type.into(),
            effect: Map::new(),
            error: error.into(),
        }
    }

    /// JSON form, as recorded in traces and shown to the scorer.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Who is acting, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// Acting NPC.
    pub npc_id: String,
    /// NPC location; `unknown` when the game never set one.
    pub current_location: String,
    /// NPC's world.
    pub world_id: String,
    /// NPC's persona.
    pub persona_id: String,
}

impl ToolContext {
    /// A context field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "npc_id" => Some(&self.npc_id),
            "current_location" => Some(&self.current_location),
            "world_id" => Some(&self.world_id),
            "persona_id" => Some(&self.persona_id),
            _ => None,
        }
    }
}

/// A tool registered at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicTool {
    /// Function-calling schema offered to the model.
    pub spec: ToolSpec,
    /// Handle of the program text in the registry's code store.
    pub handle: CodeHandle,
}

/// Any tool the registry can dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Tool {
    /// One of the built-in actions.
    Builtin(BuiltinTool),
    /// A sandboxed runtime tool.
    Dynamic(DynamicTool),
}

impl Tool {
    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(b) => b.name(),
            Self::Dynamic(d) => &d.spec.name,
        }
    }

    /// Function-calling schema.
    #[must_use]
    pub fn spec(&self) -> ToolSpec {
        match self {
            Self::Builtin(b) => b.spec(),
            Self::Dynamic(d) => d.spec.clone(),
        }
    }
}
