//! Capability-restricted interpreter for dynamic tools.
//!
//! A dynamic tool's program is JSON: `{"ops": [...]}`, each op tagged by
//! `"op"`.  Only the ops in [`Op`] exist; a program can read its arguments
//! and the [`ToolContext`], write keys of its effect, or fail.  There is no
//! file, network or process primitive to reach for.  Anything that does not
//! parse as an allow-listed op, or runs past the step budget, is a failed
//! [`ActionResult`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{ActionResult, ToolContext};

/// Namespace for content-addressed program handles.
const CODE_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c52_9e0d_4b7a_8c21_5f44_d0e9_b713);

/// Content address of a dynamic tool's program text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeHandle(Uuid);

impl CodeHandle {
    /// Handle for `program`; equal texts share a handle.
    #[must_use]
    pub fn of(program: &str) -> Self {
        Self(Uuid::new_v5(&CODE_NAMESPACE, program.as_bytes()))
    }
}

impl std::fmt::Display for CodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code-{}", self.0)
    }
}

/// One allow-listed instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Op {
    /// Fail unless `arg` was supplied.
    Require {
        /// Argument name.
        arg: String,
    },
    /// `effect[key] = args[arg]`, or `default` when absent.
    SetFromArg {
        /// Effect key.
        key: String,
        /// Argument name.
        arg: String,
        /// Value used when the argument is absent.
        #[serde(default)]
        default: Option<Value>,
    },
    /// `effect[key] = ctx.<field>`.
    SetFromContext {
        /// Effect key.
        key: String,
        /// [`ToolContext`] field name.
        field: String,
    },
    /// `effect[key] = value`.
    SetLiteral {
        /// Effect key.
        key: String,
        /// Literal value.
        value: Value,
    },
    /// Stop with a failure.
    Fail {
        /// Failure message.
        message: String,
    },
}

/// A parsed program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    /// Instructions, run in order.
    pub ops: Vec<Op>,
}

/// Runs dynamic-tool programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sandbox {
    max_steps: usize,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self { max_steps: 64 }
    }
}

impl Sandbox {
    /// A sandbox that stops programs after `max_steps` ops.
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Parse `source` into a [`Program`].
    ///
    /// # Errors
    ///
    /// Returns a message naming the first thing outside the allow-list.
    pub fn compile(&self, source: &str) -> Result<Program, String> {
        let program: Program =
            serde_json::from_str(source).map_err(|e| format!("Program rejected: {e}"))?;
        if program.ops.len() > self.max_steps {
            return Err(format!(
                "Program rejected: {} ops exceeds the limit of {}",
                program.ops.len(),
                self.max_steps
            ));
        }
        Ok(program)
    }

    /// Compile and run `source` as tool `name`.
    #[must_use]
    pub fn run(&self, name: &str, source: &str, args: &Map<String, Value>, ctx: &ToolContext) -> ActionResult {
        match self.compile(source) {
            Ok(program) => self.execute(name, &program, args, ctx),
            Err(e) => ActionResult::failed(name, e),
        }
    }

    /// Run a compiled program.
    #[must_use]
    pub fn execute(&self, name: &str, program: &Program, args: &Map<String, Value>, ctx: &ToolContext) -> ActionResult {
        let mut effect = Map::new();
        for (step, op) in program.ops.iter().enumerate() {
            if step >= self.max_steps {
                return ActionResult::failed(name, format!("Step limit of {} exceeded", self.max_steps));
            }
            match op {
                Op::Require { arg } => {
                    if args.get(arg).is_none_or(Value::is_null) {
                        return ActionResult::failed(name, format!("Missing required argument: {arg}"));
                    }
                }
                Op::SetFromArg { key, arg, default } => {
                    match args.get(arg).filter(|v| !v.is_null()).or(default.as_ref()) {
                        Some(v) => {
                            effect.insert(key.clone(), v.clone());
                        }
                        None => {
                            return ActionResult::failed(name, format!("Missing required argument: {arg}"));
                        }
                    }
                }
                Op::SetFromContext { key, field } => match ctx.field(field) {
                    Some(v) => {
                        effect.insert(key.clone(), Value::String(v.to_string()));
                    }
                    None => {
                        return ActionResult::failed(name, format!("Context field '{field}' is not available"));
                    }
                },
                Op::SetLiteral { key, value } => {
                    effect.insert(key.clone(), value.clone());
                }
                Op::Fail { message } => return ActionResult::failed(name, message.clone()),
            }
        }
        ActionResult::ok(name, effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ToolContext {
        ToolContext {
            npc_id: "npc_1".into(),
            current_location: "forge".into(),
            world_id: "w1".into(),
            persona_id: "p1".into(),
        }
    }

    const WAVE: &str = r#"{"ops": [
        {"op": "require", "arg": "target_id"},
        {"op": "set_literal", "key": "waved", "value": true},
        {"op": "set_from_arg", "key": "target", "arg": "target_id"},
        {"op": "set_from_arg", "key": "style", "arg": "style", "default": "casual"},
        {"op": "set_from_context", "key": "where", "field": "current_location"}
    ]}"#;

    #[test]
    fn handles_are_content_addressed() {
        assert_eq!(CodeHandle::of(WAVE), CodeHandle::of(WAVE));
        assert_ne!(CodeHandle::of(WAVE), CodeHandle::of("{}"));
    }

    #[test]
    fn runs_allow_listed_program() {
        let mut args = Map::new();
        args.insert("target_id".into(), json!("player_1"));
        let r = Sandbox::default().run("wave", WAVE, &args, &ctx());
        assert!(r.success, "{}", r.error);
        assert_eq!(r.effect["target"], "player_1");
        assert_eq!(r.effect["style"], "casual");
        assert_eq!(r.effect["where"], "forge");
    }

    #[test]
    fn missing_argument_is_structured_failure() {
        let r = Sandbox::default().run("wave", WAVE, &Map::new(), &ctx());
        assert!(!r.success);
        assert_eq!(r.error, "Missing required argument: target_id");
    }

    #[test]
    fn unknown_ops_are_rejected() {
        for source in [
            r#"{"ops": [{"op": "read_file", "path": "/etc/passwd"}]}"#,
            r#"{"ops": [{"op": "exec", "cmd": "rm -rf /"}], "env": {}}"#,
            "import os; os.system('ls')",
        ] {
            let r = Sandbox::default().run("evil", source, &Map::new(), &ctx());
            assert!(!r.success);
            assert!(r.error.starts_with("Program rejected"), "{}", r.error);
        }
    }

    #[test]
    fn step_budget_is_enforced() {
        let ops: Vec<Value> = (0..5).map(|i| json!({"op": "set_literal", "key": format!("k{i}"), "value": i})).collect();
        let source = json!({ "ops": ops }).to_string();
        let r = Sandbox::new(3).run("long", &source, &Map::new(), &ctx());
        assert!(!r.success);
        assert!(r.error.contains("exceeds the limit of 3"));
    }

    #[test]
    fn unknown_context_field_fails() {
        let source = r#"{"ops": [{"op": "set_from_context", "key": "k", "field": "home_dir"}]}"#;
        let r = Sandbox::default().run("peek", source, &Map::new(), &ctx());
        assert_eq!(r.error, "Context field 'home_dir' is not available");
    }
}
