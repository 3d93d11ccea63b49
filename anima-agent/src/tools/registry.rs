//! Tool registry and dispatch.
//!
//! One registry is built by the composition root and handed to the
//! orchestrator.  Dynamic tools can be added while turns are running, so
//! the tool table sits behind a lock; dispatch clones what it needs and
//! releases it before running anything.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info};

use anima_llm::ToolSpec;

use super::sandbox::{CodeHandle, Program, Sandbox};
use super::{Action, ActionResult, BuiltinTool, DynamicTool, Tool, ToolContext};
use crate::error::{Result, TurnError};

#[derive(Default)]
struct Table {
    /// Registration order, for stable specs.
    tools: Vec<Tool>,
    by_name: HashMap<String, usize>,
    programs: HashMap<CodeHandle, Program>,
}

/// The set of actions an NPC may take.
pub struct ToolRegistry {
    table: RwLock<Table>,
    sandbox: Sandbox,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ToolRegistry {
    /// A registry with no tools.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: RwLock::new(Table::default()),
            sandbox: Sandbox::default(),
        }
    }

    /// A registry holding every [`BuiltinTool`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        {
            let mut table = registry.table.write();
            for builtin in BuiltinTool::ALL {
                let at = table.tools.len();
                table.by_name.insert(builtin.name().to_string(), at);
                table.tools.push(Tool::Builtin(builtin));
            }
        }
        registry
    }

    /// Replace the sandbox used for dynamic tools.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Sandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Whether `name` is a registered tool.
    #[must_use]
    pub fn is_valid(&self, name: &str) -> bool {
        self.table.read().by_name.contains_key(name)
    }

    /// The tool called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Tool> {
        let table = self.table.read();
        table.by_name.get(name).map(|&i| table.tools[i].clone())
    }

    /// Function-calling schemas for every tool, in registration order.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.table.read().tools.iter().map(Tool::spec).collect()
    }

    /// Registered tool names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.table.read().tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Register a sandboxed tool.
    ///
    /// The program is compiled up front and stored under its content
    /// address; registering the same text twice under different names
    /// shares one stored program.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Registry`] if the name is empty or taken, or the
    /// program uses anything outside the sandbox's allow-list.
    pub fn register_dynamic(
        &self,
        name: &str,
        description: &str,
        parameters: Value,
        program: &str,
    ) -> Result<CodeHandle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TurnError::Registry("tool name must not be empty".into()));
        }
        let compiled = self.sandbox.compile(program).map_err(TurnError::Registry)?;
        let handle = CodeHandle::of(program);

        let mut table = self.table.write();
        if table.by_name.contains_key(name) {
            return Err(TurnError::Registry(format!("tool '{name}' is already registered")));
        }
        table.programs.entry(handle).or_insert(compiled);
        let tool = Tool::Dynamic(DynamicTool {
            spec: ToolSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
            handle,
        });
        let at = table.tools.len();
        table.by_name.insert(name.to_string(), at);
        table.tools.push(tool);
        info!(tool = name, handle = %handle, "dynamic tool registered");
        Ok(handle)
    }

    /// Execute `action`.
    ///
    /// Never fails: unknown tools, invalid arguments and sandbox faults all
    /// come back as a failed [`ActionResult`] with a non-empty error.
    #[must_use]
    pub fn execute(&self, action: &Action, ctx: &ToolContext) -> ActionResult {
        let name = action.action_type.as_str();
        let dispatch = {
            let table = self.table.read();
            table.by_name.get(name).map(|&i| match &table.tools[i] {
                Tool::Builtin(b) => Dispatch::Builtin(*b),
                Tool::Dynamic(d) => Dispatch::Dynamic(table.programs.get(&d.handle).cloned()),
            })
        };

        let mut result = match dispatch {
            None => ActionResult::failed(name, format!("Unknown action type: {name}")),
            Some(Dispatch::Builtin(b)) => b.execute(&action.arguments, ctx),
            Some(Dispatch::Dynamic(Some(program))) => {
                self.sandbox.execute(name, &program, &action.arguments, ctx)
            }
            Some(Dispatch::Dynamic(None)) => {
                ActionResult::failed(name, format!("No program stored for tool {name}"))
            }
        };

        if result.success {
            debug!(npc_id = %ctx.npc_id, action = name, "action executed");
        } else {
            if result.error.trim().is_empty() {
                result.error = format!("Tool {name} execution failed without error message");
            }
            error!(npc_id = %ctx.npc_id, action = name, error = %result.error, "action failed");
        }
        result
    }
}

enum Dispatch {
    Builtin(BuiltinTool),
    Dynamic(Option<Program>),
}
