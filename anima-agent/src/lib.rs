//! # anima-agent — NPC Turn Orchestration
//!
//! This crate runs one cognitive turn for an NPC: it records what the NPC
//! observed, recalls what matters, decides whether to reflect, asks the
//! model for exactly one action, executes it, and writes an audit trace.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               anima (CLI)               │
//! │  ┌───────────────────────────────────┐  │
//! │  │          anima-agent              │  │
//! │  │  ┌─────────────┐ ┌─────────────┐  │  │
//! │  │  │ Orchestrator│ │    Tools    │  │  │
//! │  │  └──────┬──────┘ └──────┬──────┘  │  │
//! │  │         │               │         │  │
//! │  │         ▼               ▼         │  │
//! │  │    ┌─────────────────────────┐    │  │
//! │  │    │      anima-core         │    │  │
//! │  │    └─────────────────────────┘    │  │
//! │  │    ┌─────────────────────────┐    │  │
//! │  │    │      anima-llm          │    │  │
//! │  │    └─────────────────────────┘    │  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `orchestrator` — the turn state machine and its side entry points
//! - `observation` — incoming game events and their natural-language summary
//! - `query` — retrieval query construction
//! - `importance` — predicted and precise importance scoring
//! - `reflection` — reflection trigger, reflection call, fact acceptance
//! - `context` — prompt blocks for planning
//! - `tools` — built-in actions, dynamic tools, and the registry
//! - `settings` / `telemetry` — ambient setup for binaries

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod error;
pub mod importance;
pub mod observation;
pub mod orchestrator;
pub mod query;
pub mod reflection;
pub mod settings;
pub mod telemetry;
pub mod tools;

pub use error::{Result, TurnError};
pub use observation::Observation;
pub use orchestrator::{TurnOrchestrator, TurnResult};
pub use settings::Settings;
pub use tools::{Action, ActionResult, ToolContext, ToolRegistry};
