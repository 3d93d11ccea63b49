//! Document store — source of truth for NPCs, personas, facts, worlds,
//! episodic memories, and turn traces.
//!
//! The similarity indices are derived data; everything they hold can be
//! re-driven from a [`DocumentStore`].  Two implementations ship:
//!
//! - [`SqliteDocumentStore`] — JSON documents in per-collection tables
//! - [`InMemoryDocumentStore`] — concurrent maps, for tests and tooling

pub mod in_memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::{EpisodicMemory, Npc, PersonaFact, PersonaProfile, TurnTrace, WorldKnowledge};
use crate::types::MemoryTier;

pub use in_memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// CRUD over the domain documents, keyed by string ids.
///
/// Missing records are `Ok(None)`, never an error.  List methods return
/// records oldest-first unless documented otherwise.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch an NPC.
    async fn get_npc(&self, id: &str) -> Result<Option<Npc>>;
    /// Insert or replace an NPC.
    async fn put_npc(&self, npc: &Npc) -> Result<()>;

    /// Fetch a persona profile.
    async fn get_persona(&self, id: &str) -> Result<Option<PersonaProfile>>;
    /// Insert or replace a persona profile.
    async fn put_persona(&self, persona: &PersonaProfile) -> Result<()>;
    /// Every persona profile.
    async fn list_personas(&self) -> Result<Vec<PersonaProfile>>;

    /// Fetch a world.
    async fn get_world(&self, id: &str) -> Result<Option<WorldKnowledge>>;
    /// Insert or replace a world.
    async fn put_world(&self, world: &WorldKnowledge) -> Result<()>;
    /// Every world.
    async fn list_worlds(&self) -> Result<Vec<WorldKnowledge>>;

    /// Insert a persona fact.
    async fn insert_fact(&self, fact: &PersonaFact) -> Result<()>;
    /// Facts belonging to one persona.
    async fn facts_by_persona(&self, persona_id: &str) -> Result<Vec<PersonaFact>>;
    /// Facts owned by one NPC.
    async fn facts_by_npc(&self, npc_id: &str) -> Result<Vec<PersonaFact>>;
    /// Every persona fact.
    async fn all_facts(&self) -> Result<Vec<PersonaFact>>;

    /// Insert an episodic memory.
    async fn insert_memory(&self, memory: &EpisodicMemory) -> Result<()>;
    /// Fetch an episodic memory.
    async fn get_memory(&self, id: &str) -> Result<Option<EpisodicMemory>>;
    /// Change a memory's tier; `false` if the memory does not exist.
    async fn set_memory_tier(&self, id: &str, tier: MemoryTier) -> Result<bool>;
    /// The `limit` newest memories of an NPC, newest first, optionally
    /// restricted to one tier.
    async fn recent_memories(
        &self,
        npc_id: &str,
        limit: usize,
        tier: Option<MemoryTier>,
    ) -> Result<Vec<EpisodicMemory>>;
    /// Every durable memory across all NPCs.
    async fn durable_memories(&self) -> Result<Vec<EpisodicMemory>>;

    /// Insert a turn trace.
    async fn insert_trace(&self, trace: &TurnTrace) -> Result<()>;
    /// Fetch a turn trace.
    async fn get_trace(&self, id: &str) -> Result<Option<TurnTrace>>;
    /// The `limit` newest traces of an NPC, newest first.
    async fn traces_by_npc(&self, npc_id: &str, limit: usize) -> Result<Vec<TurnTrace>>;
}
