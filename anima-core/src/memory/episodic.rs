//! Episodic Memory — one recorded turn event from an NPC's perspective.
//!
//! The tier is decided once at creation from an importance threshold.
//! The only later mutation is an explicit manual promotion to durable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{short_id, MemorySource, MemoryTier};

/// A single episodic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
    /// Unique identifier (`mem_xxxxxxxx`).
    pub id: String,
    /// Owning NPC.
    pub npc_id: String,
    /// Ephemeral or durable.
    pub tier: MemoryTier,
    /// Natural language content.
    pub content: String,
    /// Which turn event produced it.
    pub source: MemorySource,
    /// Significance in \[0, 1\].
    pub importance: f32,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl EpisodicMemory {
    /// Create a memory, classifying its tier against `long_term_threshold`.
    ///
    /// Importance is clamped to \[0, 1\].
    #[must_use]
    pub fn new(
        npc_id: impl Into<String>,
        content: impl Into<String>,
        source: MemorySource,
        importance: f32,
        tags: Vec<String>,
        long_term_threshold: f32,
    ) -> Self {
        let importance = importance.clamp(0.0, 1.0);
        Self {
            id: short_id("mem"),
            npc_id: npc_id.into(),
            tier: MemoryTier::classify(importance, long_term_threshold),
            content: content.into(),
            source,
            importance,
            tags,
            created_at: Utc::now(),
        }
    }

    /// Whether this memory lives in the durable tier.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.tier == MemoryTier::Durable
    }
}
