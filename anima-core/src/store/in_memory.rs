//! In-process [`DocumentStore`] over concurrent maps.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::memory::{EpisodicMemory, Npc, PersonaFact, PersonaProfile, TurnTrace, WorldKnowledge};
use crate::store::DocumentStore;
use crate::types::MemoryTier;

/// Documents tagged with an insertion sequence so ordering is total even
/// when timestamps collide.
type Seq<T> = DashMap<String, (u64, T)>;

/// A [`DocumentStore`] that lives entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    seq: AtomicU64,
    npcs: DashMap<String, Npc>,
    personas: Seq<PersonaProfile>,
    worlds: Seq<WorldKnowledge>,
    facts: Seq<PersonaFact>,
    memories: Seq<EpisodicMemory>,
    traces: Seq<TurnTrace>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of stored episodic memories.
    #[must_use]
    pub fn memory_count(&self) -> usize {
        self.memories.len()
    }

    /// Number of stored traces.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Number of stored persona facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}

/// Values of `map` passing `keep`, ordered by insertion sequence.
fn ordered<T: Clone>(map: &Seq<T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut rows: Vec<(u64, T)> = map
        .iter()
        .filter(|e| keep(&e.value().1))
        .map(|e| e.value().clone())
        .collect();
    rows.sort_by_key(|(seq, _)| *seq);
    rows.into_iter().map(|(_, v)| v).collect()
}

/// Keep the version sequence of an existing key on replace.
fn upsert<T>(map: &Seq<T>, id: &str, seq: u64, value: T) {
    let seq = map.get(id).map_or(seq, |e| e.value().0);
    map.insert(id.to_string(), (seq, value));
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_npc(&self, id: &str) -> Result<Option<Npc>> {
        Ok(self.npcs.get(id).map(|e| e.value().clone()))
    }

    async fn put_npc(&self, npc: &Npc) -> Result<()> {
        self.npcs.insert(npc.id.clone(), npc.clone());
        Ok(())
    }

    async fn get_persona(&self, id: &str) -> Result<Option<PersonaProfile>> {
        Ok(self.personas.get(id).map(|e| e.value().1.clone()))
    }

    async fn put_persona(&self, persona: &PersonaProfile) -> Result<()> {
        upsert(&self.personas, &persona.id, self.next(), persona.clone());
        Ok(())
    }

    async fn list_personas(&self) -> Result<Vec<PersonaProfile>> {
        Ok(ordered(&self.personas, |_| true))
    }

    async fn get_world(&self, id: &str) -> Result<Option<WorldKnowledge>> {
        Ok(self.worlds.get(id).map(|e| e.value().1.clone()))
    }

    async fn put_world(&self, world: &WorldKnowledge) -> Result<()> {
        upsert(&self.worlds, &world.id, self.next(), world.clone());
        Ok(())
    }

    async fn list_worlds(&self) -> Result<Vec<WorldKnowledge>> {
        Ok(ordered(&self.worlds, |_| true))
    }

    async fn insert_fact(&self, fact: &PersonaFact) -> Result<()> {
        self.facts.insert(fact.id.clone(), (self.next(), fact.clone()));
        Ok(())
    }

    async fn facts_by_persona(&self, persona_id: &str) -> Result<Vec<PersonaFact>> {
        Ok(ordered(&self.facts, |f| f.persona_id == persona_id))
    }

    async fn facts_by_npc(&self, npc_id: &str) -> Result<Vec<PersonaFact>> {
        Ok(ordered(&self.facts, |f| f.npc_id.as_deref() == Some(npc_id)))
    }

    async fn all_facts(&self) -> Result<Vec<PersonaFact>> {
        Ok(ordered(&self.facts, |_| true))
    }

    async fn insert_memory(&self, memory: &EpisodicMemory) -> Result<()> {
        self.memories
            .insert(memory.id.clone(), (self.next(), memory.clone()));
        Ok(())
    }

    async fn get_memory(&self, id: &str) -> Result<Option<EpisodicMemory>> {
        Ok(self.memories.get(id).map(|e| e.value().1.clone()))
    }

    async fn set_memory_tier(&self, id: &str, tier: MemoryTier) -> Result<bool> {
        Ok(match self.memories.get_mut(id) {
            Some(mut entry) => {
                entry.value_mut().1.tier = tier;
                true
            }
            None => false,
        })
    }

    async fn recent_memories(
        &self,
        npc_id: &str,
        limit: usize,
        tier: Option<MemoryTier>,
    ) -> Result<Vec<EpisodicMemory>> {
        let mut rows = ordered(&self.memories, |m| {
            m.npc_id == npc_id && tier.is_none_or(|t| m.tier == t)
        });
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }

    async fn durable_memories(&self) -> Result<Vec<EpisodicMemory>> {
        Ok(ordered(&self.memories, EpisodicMemory::is_durable))
    }

    async fn insert_trace(&self, trace: &TurnTrace) -> Result<()> {
        self.traces
            .insert(trace.trace_id.clone(), (self.next(), trace.clone()));
        Ok(())
    }

    async fn get_trace(&self, id: &str) -> Result<Option<TurnTrace>> {
        Ok(self.traces.get(id).map(|e| e.value().1.clone()))
    }

    async fn traces_by_npc(&self, npc_id: &str, limit: usize) -> Result<Vec<TurnTrace>> {
        let mut rows = ordered(&self.traces, |t| t.npc_id == npc_id);
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }
}
