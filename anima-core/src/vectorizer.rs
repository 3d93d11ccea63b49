//! Vectorization Pipeline — domain records → embeddings → index rows.
//!
//! One [`VectorizationPipeline`] is bound to exactly one named index.  Each
//! `vectorize_*` call is atomic from the caller's perspective:
//!
//! 1. embed every text of the call (outside the lock)
//! 2. append to the [`SimilarityIndex`] and the [`MetadataLog`]
//! 3. persist both files
//!
//! Steps 2 and 3 run under a single per-index mutex so index and log
//! ordinals never drift apart.  Embedding errors propagate unchanged; retry
//! is the embedding service's job.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::AnimaConfig;
use crate::embedding::EmbeddingService;
use crate::error::{AnimaError, Result};
use crate::index::SimilarityIndex;
use crate::memory::{EpisodicMemory, PersonaFact, PersonaProfile, WorldKnowledge};
use crate::metadata::{truncate_chars, MetadataLog, MetadataRecord};
use crate::types::{Embedding, IndexKind, Ordinal, SourceType};

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// One embeddable piece of a persona profile or world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk label stored as `chunk_type`.
    pub label: &'static str,
    /// Text that gets embedded.
    pub text: String,
}

impl Chunk {
    fn new(label: &'static str, text: String) -> Self {
        Self { label, text }
    }
}

/// Split a persona profile into independent semantic chunks.
///
/// Each populated field becomes exactly one chunk; empty fields are skipped.
#[must_use]
pub fn persona_chunks(persona: &PersonaProfile) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if !persona.traits.is_empty() {
        chunks.push(Chunk::new("traits", format!("Personality traits: {}", persona.traits.join(", "))));
    }
    if !persona.habits.is_empty() {
        chunks.push(Chunk::new("habits", format!("Behavioral habits: {}", persona.habits.join(", "))));
    }
    if !persona.goals.is_empty() {
        chunks.push(Chunk::new("goals", format!("Long-term goals: {}", persona.goals.join(", "))));
    }
    if !persona.background.trim().is_empty() {
        chunks.push(Chunk::new("background", format!("Background: {}", persona.background)));
    }
    if !persona.speech_style.trim().is_empty() {
        chunks.push(Chunk::new("speech_style", format!("Speech style: {}", persona.speech_style)));
    }
    if !persona.constraints.is_empty() {
        let json = serde_json::Value::Object(persona.constraints.clone());
        chunks.push(Chunk::new("constraints", format!("Constraints: {json}")));
    }
    chunks
}

/// Expand world knowledge into chunks.
///
/// Laws, factions, norms, and locations produce one chunk per item; global
/// constraints produce a single chunk.
#[must_use]
pub fn world_chunks(world: &WorldKnowledge) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for law in &world.rules.laws {
        chunks.push(Chunk::new("law", format!("Law: {law}")));
    }
    for (name, desc) in &world.rules.factions {
        chunks.push(Chunk::new("faction", format!("Faction {name}: {desc}")));
    }
    for norm in &world.rules.social_norms {
        chunks.push(Chunk::new("social_norm", format!("Social norm: {norm}")));
    }
    for (name, info) in &world.locations {
        chunks.push(Chunk::new("location", format!("Location {name}: {info}")));
    }
    if !world.global_constraints.is_empty() {
        let json = serde_json::Value::Object(world.global_constraints.clone());
        chunks.push(Chunk::new("global_constraints", format!("Global constraints: {json}")));
    }
    chunks
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A search hit joined with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedHit {
    /// Index the hit came from.
    pub index: IndexKind,
    /// Row ordinal.
    pub ordinal: Ordinal,
    /// Raw cosine similarity.
    pub similarity: f32,
    /// Metadata stored at the same ordinal.
    pub record: MetadataRecord,
}

struct PipelineState {
    index: SimilarityIndex,
    log: MetadataLog,
    opened: bool,
}

impl PipelineState {
    /// Lazily open the backing files; create an empty index if none exist.
    ///
    /// If the files disagree on length (a write died between the two
    /// saves), both sides are cut back to the shorter one so the next
    /// append lands on matching ordinals.
    fn ensure_open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        if self.index.load()? {
            self.log.load()?;
            let vectors = self.index.len();
            let records = self.log.len();
            if vectors != records {
                let keep = vectors.min(records);
                warn!(
                    index = %self.index.name(),
                    vectors,
                    records,
                    keep,
                    "index and metadata log lengths differ; dropping unpaired rows"
                );
                self.index.truncate(keep);
                self.log.truncate(keep);
            }
        } else {
            self.index.create();
            self.log.clear();
        }
        self.opened = true;
        Ok(())
    }

    /// Append paired rows and persist both files.
    ///
    /// On a save failure the in-memory rows are rolled back, so a retry
    /// does not duplicate them.
    fn append(&mut self, vectors: &[Embedding], records: Vec<MetadataRecord>) -> Result<Vec<Ordinal>> {
        if vectors.len() != records.len() {
            return Err(AnimaError::InvalidInput(format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                records.len()
            )));
        }
        self.ensure_open()?;
        let before = self.index.len();
        let ordinals = self.index.add(vectors)?;
        for record in records {
            self.log.add(record);
        }
        if let Err(err) = self.index.save().and_then(|()| self.log.save()) {
            self.index.truncate(before);
            self.log.truncate(before);
            warn!(index = %self.index.name(), error = %err, "persisting appended rows failed; rolled back");
            return Err(err);
        }
        Ok(ordinals)
    }
}

/// Vectorization pipeline bound to one named index.
pub struct VectorizationPipeline {
    kind: IndexKind,
    embedder: Arc<dyn EmbeddingService>,
    summary_chars: usize,
    state: Mutex<PipelineState>,
}

impl std::fmt::Debug for VectorizationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorizationPipeline")
            .field("kind", &self.kind)
            .field("model", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl VectorizationPipeline {
    /// Bind a pipeline to index `kind` stored under the given directories.
    #[must_use]
    pub fn new(
        kind: IndexKind,
        dimensions: usize,
        index_dir: &Path,
        meta_dir: &Path,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            kind,
            embedder,
            summary_chars: 200,
            state: Mutex::new(PipelineState {
                index: SimilarityIndex::new(kind.as_str(), dimensions, index_dir),
                log: MetadataLog::new(kind.as_str(), meta_dir),
                opened: false,
            }),
        }
    }

    /// Bind a pipeline using the storage and embedding sections of `config`.
    #[must_use]
    pub fn from_config(kind: IndexKind, config: &AnimaConfig, embedder: Arc<dyn EmbeddingService>) -> Self {
        let mut pipeline = Self::new(
            kind,
            config.embedding.dimensions,
            &config.storage.index_dir,
            &config.storage.meta_dir,
            embedder,
        );
        pipeline.summary_chars = config.memory.summary_chars;
        pipeline
    }

    /// The index this pipeline writes to.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Number of vectors currently held (opens the index if needed).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing files cannot be loaded.
    pub fn len(&self) -> Result<usize> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        Ok(state.index.len())
    }

    /// Whether the index is empty.
    ///
    /// # Errors
    ///
    /// Same as [`len`](Self::len).
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn summary(&self, text: &str) -> String {
        truncate_chars(text, self.summary_chars).to_string()
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AnimaError::Embedding(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn write(&self, vectors: &[Embedding], records: Vec<MetadataRecord>) -> Result<Vec<Ordinal>> {
        let started = Instant::now();
        let ordinals = self.state.lock().append(vectors, records)?;
        debug!(
            index = %self.kind,
            count = ordinals.len(),
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "appended vectors"
        );
        Ok(ordinals)
    }

    /// Vectorize one durable episodic memory.
    ///
    /// # Errors
    ///
    /// Propagates embedding, dimension, and persistence errors.
    pub async fn vectorize_episodic_memory(
        &self,
        memory_id: &str,
        npc_id: &str,
        content: &str,
        importance: f32,
        created_at: DateTime<Utc>,
    ) -> Result<Ordinal> {
        let vector = self.embedder.embed_single(content).await?;
        let mut record = MetadataRecord::new(
            SourceType::Episodic,
            memory_id,
            Some(npc_id.to_string()),
            importance,
            self.summary(content),
        );
        record.created_at = created_at;
        let ordinals = self.write(&[vector], vec![record])?;
        info!(index = %self.kind, memory_id, npc_id, "vectorized episodic memory");
        ordinals
            .first()
            .copied()
            .ok_or_else(|| AnimaError::Embedding("no ordinal assigned".into()))
    }

    /// Vectorize an [`EpisodicMemory`] record.
    ///
    /// # Errors
    ///
    /// Same as [`vectorize_episodic_memory`](Self::vectorize_episodic_memory).
    pub async fn vectorize_memory(&self, memory: &EpisodicMemory) -> Result<Ordinal> {
        self.vectorize_episodic_memory(
            &memory.id,
            &memory.npc_id,
            &memory.content,
            memory.importance,
            memory.created_at,
        )
        .await
    }

    /// Chunk and vectorize a persona profile in one batch.
    ///
    /// A profile with no populated fields is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates embedding, dimension, and persistence errors; nothing is
    /// written if any step fails before the append.
    pub async fn vectorize_persona_chunks(&self, persona: &PersonaProfile) -> Result<Vec<Ordinal>> {
        let chunks = persona_chunks(persona);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;
        let records = chunks
            .into_iter()
            .map(|c| {
                let mut rec = MetadataRecord::new(SourceType::Persona, &persona.id, None, 1.0, self.summary(&c.text));
                rec.created_at = persona.created_at;
                rec.chunk_type = Some(c.label.to_string());
                rec
            })
            .collect();
        let ordinals = self.write(&vectors, records)?;
        info!(index = %self.kind, persona_id = %persona.id, chunks = ordinals.len(), "vectorized persona chunks");
        Ok(ordinals)
    }

    /// Chunk and vectorize world knowledge in one batch.
    ///
    /// # Errors
    ///
    /// Propagates embedding, dimension, and persistence errors.
    pub async fn vectorize_world_chunks(&self, world: &WorldKnowledge) -> Result<Vec<Ordinal>> {
        let chunks = world_chunks(world);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;
        let records = chunks
            .into_iter()
            .map(|c| {
                let mut rec = MetadataRecord::new(SourceType::World, &world.id, None, 1.0, self.summary(&c.text));
                rec.created_at = world.created_at;
                rec.chunk_type = Some(c.label.to_string());
                rec
            })
            .collect();
        let ordinals = self.write(&vectors, records)?;
        info!(index = %self.kind, world_id = %world.id, chunks = ordinals.len(), "vectorized world chunks");
        Ok(ordinals)
    }

    fn fact_record(&self, fact: &PersonaFact) -> MetadataRecord {
        let mut rec = MetadataRecord::new(
            SourceType::PersonaFact,
            &fact.id,
            fact.npc_id.clone(),
            1.0,
            self.summary(&fact.content),
        );
        rec.created_at = fact.created_at;
        rec.persona_id = Some(fact.persona_id.clone());
        rec.dimension = Some(fact.dimension);
        rec.content = Some(fact.content.clone());
        rec.origin = Some(fact.origin);
        rec
    }

    /// Vectorize a single persona fact.
    ///
    /// # Errors
    ///
    /// Propagates embedding, dimension, and persistence errors.
    pub async fn vectorize_persona_fact(&self, fact: &PersonaFact) -> Result<Ordinal> {
        let vector = self.embedder.embed_single(&fact.embedding_text()).await?;
        let ordinals = self.write(&[vector], vec![self.fact_record(fact)])?;
        debug!(index = %self.kind, fact_id = %fact.id, dimension = %fact.dimension, "vectorized persona fact");
        ordinals
            .first()
            .copied()
            .ok_or_else(|| AnimaError::Embedding("no ordinal assigned".into()))
    }

    /// Vectorize many persona facts with one batch embedding call.
    ///
    /// # Errors
    ///
    /// Propagates embedding, dimension, and persistence errors.
    pub async fn vectorize_persona_facts_bulk(&self, facts: &[PersonaFact]) -> Result<Vec<Ordinal>> {
        if facts.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = facts.iter().map(PersonaFact::embedding_text).collect();
        let vectors = self.embed_all(&texts).await?;
        let records = facts.iter().map(|f| self.fact_record(f)).collect();
        let ordinals = self.write(&vectors, records)?;
        info!(index = %self.kind, facts = ordinals.len(), "vectorized persona facts");
        Ok(ordinals)
    }

    /// Discard the bound index and log in memory.
    ///
    /// Files are untouched until the next write or [`persist`](Self::persist).
    pub fn reindex(&self) {
        let mut state = self.state.lock();
        state.index.create();
        state.log.clear();
        state.opened = true;
        info!(index = %self.kind, "index reset for reindexing");
    }

    /// Write the current index and log to disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn persist(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.index.save()?;
        state.log.save()
    }

    /// Search with a pre-computed query vector, joining metadata.
    ///
    /// Ordinals without metadata (a concurrent write in flight) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::DimensionMismatch`] for a wrong-width query or
    /// a load error if the index cannot be opened.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<IndexedHit>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let hits = state.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                state.log.get(hit.ordinal).map(|record| IndexedHit {
                    index: self.kind,
                    ordinal: hit.ordinal,
                    similarity: hit.score,
                    record: record.clone(),
                })
            })
            .collect())
    }

    /// Embed `query_text` and search.
    ///
    /// # Errors
    ///
    /// Propagates embedding errors and those of [`search`](Self::search).
    pub async fn search_text(&self, query_text: &str, k: usize) -> Result<Vec<IndexedHit>> {
        let query = self.embedder.embed_single(query_text).await?;
        self.search(&query, k)
    }

    /// Metadata for every row pointing at one source document.
    ///
    /// # Errors
    ///
    /// Returns a load error if the index cannot be opened.
    pub fn records_for_source(&self, source_type: SourceType, source_id: &str) -> Result<Vec<MetadataRecord>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .log
            .get_by_source(source_type, source_id)
            .into_iter()
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Pipeline set
// ---------------------------------------------------------------------------

/// The three named pipelines a process shares.
#[derive(Debug, Clone)]
pub struct PipelineSet {
    episodic: Arc<VectorizationPipeline>,
    persona: Arc<VectorizationPipeline>,
    world: Arc<VectorizationPipeline>,
}

impl PipelineSet {
    /// Bind one pipeline per named index using `config`.
    #[must_use]
    pub fn from_config(config: &AnimaConfig, embedder: Arc<dyn EmbeddingService>) -> Self {
        let bind = |kind| Arc::new(VectorizationPipeline::from_config(kind, config, Arc::clone(&embedder)));
        Self {
            episodic: bind(IndexKind::Episodic),
            persona: bind(IndexKind::Persona),
            world: bind(IndexKind::World),
        }
    }

    /// The pipeline bound to `kind`.
    #[must_use]
    pub fn get(&self, kind: IndexKind) -> &Arc<VectorizationPipeline> {
        match kind {
            IndexKind::Episodic => &self.episodic,
            IndexKind::Persona => &self.persona,
            IndexKind::World => &self.world,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingService;
    use crate::memory::WorldRules;
    use crate::types::FactDimension;

    fn pipeline(kind: IndexKind, dir: &Path, svc: Arc<HashEmbeddingService>) -> VectorizationPipeline {
        VectorizationPipeline::new(kind, 32, &dir.join("idx"), &dir.join("meta"), svc)
    }

    #[test]
    fn persona_chunks_skip_empty_fields() {
        let mut p = PersonaProfile::named("p1", "Mira");
        assert!(persona_chunks(&p).is_empty());
        p.traits = vec!["wise".into(), "patient".into()];
        p.speech_style = "Formal".into();
        let chunks = persona_chunks(&p);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Personality traits: wise, patient");
        assert_eq!(chunks[1].label, "speech_style");
    }

    #[test]
    fn world_chunks_are_per_item() {
        let mut w = WorldKnowledge::titled("w1", "Vale");
        w.rules = WorldRules {
            laws: vec!["No magic in public".into(), "Respect the king".into()],
            factions: [("wizards".to_string(), "Neutral".to_string())].into_iter().collect(),
            social_norms: vec!["Greet with respect".into()],
        };
        w.global_constraints.insert("time_period".into(), serde_json::json!("medieval"));
        let chunks = world_chunks(&w);
        let labels: Vec<&str> = chunks.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["law", "law", "faction", "social_norm", "global_constraints"]);
        assert_eq!(chunks[2].text, "Faction wizards: Neutral");
    }

    #[tokio::test]
    async fn empty_persona_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        let p = pipeline(IndexKind::Persona, dir.path(), svc.clone());
        let ordinals = p
            .vectorize_persona_chunks(&PersonaProfile::named("p1", "Nobody"))
            .await
            .expect("no-op");
        assert!(ordinals.is_empty());
        assert_eq!(svc.calls(), 0);
    }

    #[tokio::test]
    async fn episodic_write_persists_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        let p = pipeline(IndexKind::Episodic, dir.path(), svc.clone());
        let ord = p
            .vectorize_episodic_memory("mem_1", "npc_1", "the bridge collapsed", 0.9, Utc::now())
            .await
            .expect("vectorize");
        assert_eq!(ord, 0);

        let reopened = pipeline(IndexKind::Episodic, dir.path(), svc);
        assert_eq!(reopened.len().expect("len"), 1);
        let hits = reopened.search_text("bridge collapsed", 3).await.expect("search");
        assert_eq!(hits[0].record.source_id, "mem_1");
        assert_eq!(hits[0].record.npc_id.as_deref(), Some("npc_1"));
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32).with_failure_marker("cursed"));
        let p = pipeline(IndexKind::Persona, dir.path(), svc);
        let facts = vec![
            PersonaFact::seeded("p1", None, FactDimension::Characteristic, "I am brave"),
            PersonaFact::seeded("p1", None, FactDimension::Experience, "I found a cursed ring"),
        ];
        assert!(p.vectorize_persona_facts_bulk(&facts).await.is_err());
        assert_eq!(p.len().expect("len"), 0);
    }

    #[tokio::test]
    async fn fact_metadata_carries_dimension_and_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        let p = pipeline(IndexKind::Persona, dir.path(), svc);
        let fact = PersonaFact::learned("p1", Some("npc_9".into()), FactDimension::GoalPlan, "I want to find my brother");
        let ord = p.vectorize_persona_fact(&fact).await.expect("vectorize");
        let recs = p.records_for_source(SourceType::PersonaFact, &fact.id).expect("records");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].vector_id, ord);
        assert_eq!(recs[0].dimension, Some(FactDimension::GoalPlan));
        assert_eq!(recs[0].persona_id.as_deref(), Some("p1"));
        assert_eq!(recs[0].npc_id.as_deref(), Some("npc_9"));
    }

    #[tokio::test]
    async fn short_metadata_log_is_realigned_before_the_next_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        let p = pipeline(IndexKind::Episodic, dir.path(), svc.clone());
        p.vectorize_episodic_memory("mem_a", "npc_1", "quiet morning at the well", 0.8, Utc::now())
            .await
            .expect("vectorize");
        p.vectorize_episodic_memory("mem_b", "npc_1", "a merchant sold apples", 0.8, Utc::now())
            .await
            .expect("vectorize");

        // Lose the second metadata line, as if the process died between saves.
        let meta = dir.path().join("meta").join("episodic_meta.jsonl");
        let raw = std::fs::read_to_string(&meta).expect("read meta");
        let first = raw.lines().next().expect("one line");
        std::fs::write(&meta, format!("{first}\n")).expect("write meta");

        let reopened = pipeline(IndexKind::Episodic, dir.path(), svc.clone());
        assert_eq!(reopened.len().expect("len"), 1);
        let ord = reopened
            .vectorize_episodic_memory("mem_c", "npc_1", "dragon fire storm", 0.9, Utc::now())
            .await
            .expect("vectorize");
        assert_eq!(ord, 1);

        let hits = reopened.search_text("dragon fire storm", 5).await.expect("search");
        assert_eq!(hits[0].record.source_id, "mem_c");
        assert_eq!(hits[0].ordinal, 1);
        assert!(hits[0].similarity > 0.99);
        assert!(hits.iter().all(|h| h.record.vector_id == h.ordinal));

        let again = pipeline(IndexKind::Episodic, dir.path(), svc);
        assert_eq!(again.len().expect("len"), 2);
        let ids: Vec<String> = again
            .search_text("dragon fire storm", 5)
            .await
            .expect("search")
            .into_iter()
            .map(|h| h.record.source_id)
            .collect();
        assert!(ids.contains(&"mem_a".to_string()));
        assert!(!ids.contains(&"mem_b".to_string()));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        // A plain file where the index directory should be makes every save fail.
        let blocked = dir.path().join("idx");
        std::fs::write(&blocked, b"not a directory").expect("write");
        let p = pipeline(IndexKind::Episodic, dir.path(), svc);

        let err = p
            .vectorize_episodic_memory("mem_1", "npc_1", "the gate was left open", 0.9, Utc::now())
            .await
            .expect_err("save fails");
        assert!(matches!(err, AnimaError::Io(_)));
        assert_eq!(p.len().expect("len"), 0);

        std::fs::remove_file(&blocked).expect("unblock");
        let ord = p
            .vectorize_episodic_memory("mem_1", "npc_1", "the gate was left open", 0.9, Utc::now())
            .await
            .expect("retry");
        assert_eq!(ord, 0);
        assert_eq!(p.len().expect("len"), 1);
        assert_eq!(p.records_for_source(SourceType::Episodic, "mem_1").expect("records").len(), 1);
    }

    #[tokio::test]
    async fn reindex_clears_until_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(32));
        let p = pipeline(IndexKind::World, dir.path(), svc.clone());
        let mut w = WorldKnowledge::titled("w1", "Vale");
        w.rules.laws = vec!["No theft".into()];
        p.vectorize_world_chunks(&w).await.expect("vectorize");

        p.reindex();
        assert_eq!(p.len().expect("len"), 0);
        assert_eq!(pipeline(IndexKind::World, dir.path(), svc.clone()).len().expect("len"), 1);

        p.persist().expect("persist");
        assert_eq!(pipeline(IndexKind::World, dir.path(), svc).len().expect("len"), 0);
    }
}
