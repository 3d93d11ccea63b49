//! Turn Trace — immutable audit record of one orchestrator run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{IndexKind, Ordinal, SourceType};

/// One retrieved row as recorded in a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHit {
    /// Index the row came from.
    pub index: IndexKind,
    /// Row ordinal within that index.
    pub ordinal: Ordinal,
    /// Raw cosine similarity.
    pub similarity: f32,
    /// Score after fact boosting.
    pub adjusted_score: f32,
    /// Kind of source record.
    pub source_type: SourceType,
    /// Source record id.
    pub source_id: String,
}

/// Write-once record of a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnTrace {
    /// Unique identifier (`trace_xxxxxxxx`).
    pub trace_id: String,
    /// NPC that took the turn.
    pub npc_id: String,
    /// Turn identifier (`turn_xxxxxxxx`).
    pub turn_id: String,
    /// Natural language observation summary.
    pub observation: String,
    /// Query text used for retrieval.
    pub retrieval_query: String,
    /// Indices that were searched.
    pub indices_searched: Vec<IndexKind>,
    /// Retrieved rows in final rank order.
    pub retrieved: Vec<TraceHit>,
    /// Persona used for the prompt.
    pub persona_used: Option<String>,
    /// World used for the prompt.
    pub world_used: Option<String>,
    /// Whether the turn reflected.
    pub reflection_used: bool,
    /// Planning prompt as sent.
    pub prompt_snapshot: String,
    /// Raw planning-call output (text plus any tool-call payload).
    pub raw_model_output: String,
    /// Name of the action that ran.
    pub chosen_action: String,
    /// Arguments the action ran with.
    pub tool_arguments: Value,
    /// Serialized action result.
    pub tool_execution_result: Value,
    /// Precise post-action importance.
    pub importance_score: f32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TurnTrace {
    /// Source ids of the retrieved rows, in rank order.
    #[must_use]
    pub fn retrieved_source_ids(&self) -> Vec<&str> {
        self.retrieved.iter().map(|h| h.source_id.as_str()).collect()
    }
}
