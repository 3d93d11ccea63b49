//! Domain records: episodic memories, personas, worlds, NPCs, and traces.
//!
//! These are the documents the store persists and the vectorization
//! pipeline turns into index rows.

pub mod episodic;
pub mod npc;
pub mod persona;
pub mod trace;
pub mod world;

pub use episodic::EpisodicMemory;
pub use npc::{Npc, NpcConfig, NpcState};
pub use persona::{PersonaFact, PersonaProfile};
pub use trace::{TraceHit, TurnTrace};
pub use world::{WorldKnowledge, WorldRules};
