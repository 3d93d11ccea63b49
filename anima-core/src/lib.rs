//! # Anima Core Library
//!
//! Vector memory engine for NPCs.  Every piece of text an NPC can later
//! recall (observations, reflections, persona chunks, persona facts, world
//! lore) is embedded, appended to one of three similarity indices, and
//! described by a row in the matching metadata log:
//!
//! - **Episodic** — durable memories of what happened to an NPC
//! - **Persona** — character profile chunks and persona facts
//! - **World** — lore, laws, factions, and locations
//!
//! The [`store::DocumentStore`] is the source of truth; indices are derived
//! data and can be rebuilt from it at any time.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`index`] | append-only cosine index with whole-file persistence |
//! | [`metadata`] | JSONL log, one record per index ordinal |
//! | [`vectorizer`] | embeds text and keeps index + log in lockstep |
//! | [`retrieval`] | multi-index search with persona-fact re-ranking |
//! | [`tiering`] | ephemeral/durable classification of new memories |

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod metadata;
pub mod retrieval;
pub mod store;
pub mod tiering;
pub mod types;
pub mod vectorizer;

pub use config::AnimaConfig;
pub use embedding::EmbeddingService;
pub use error::{AnimaError, Result};
pub use retrieval::{RetrievalOutcome, RetrievalResult, Retriever};
pub use tiering::{MemoryTiering, StoredMemory};
pub use types::*;
pub use vectorizer::{PipelineSet, VectorizationPipeline};
