//! Retriever — multi-index search with persona-fact re-ranking.
//!
//! 1. infer relevant fact dimensions from the query (and event type)
//! 2. embed the query once and search every requested index
//! 3. re-rank persona-fact hits with the base weight and dimension boost
//! 4. stable-sort by adjusted score, descending
//!
//! [`Retriever::retrieve_for_npc`] filters *after* ranking, so removing a
//! hit never reorders the survivors.

pub mod dimensions;
pub mod scoring;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::metadata::MetadataRecord;
use crate::types::{FactDimension, IndexKind, Ordinal};
use crate::vectorizer::PipelineSet;

pub use dimensions::{DimensionClassifier, KeywordDimensionClassifier};
pub use scoring::BoostWeights;

/// Breakdown of an adjusted retrieval score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Raw cosine similarity from the index.
    pub similarity: f32,
    /// Whether the persona-fact base weight was applied.
    pub fact_weighted: bool,
    /// Whether the dimension-match boost was added.
    pub dimension_matched: bool,
    /// Final score used for ranking.
    pub adjusted: f32,
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    /// Index the hit came from.
    pub index: IndexKind,
    /// Row ordinal in that index.
    pub ordinal: Ordinal,
    /// Metadata of the row.
    pub record: MetadataRecord,
    /// Score breakdown; `breakdown.adjusted` is the ranking key.
    pub breakdown: ScoreBreakdown,
}

impl RetrievalResult {
    /// Adjusted score.
    #[must_use]
    pub fn score(&self) -> f32 {
        self.breakdown.adjusted
    }
}

/// Everything a retrieval produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    /// Query text as given.
    pub query_text: String,
    /// Indices that were searched, in order.
    pub indices_searched: Vec<IndexKind>,
    /// Hits requested per index.
    pub top_k: usize,
    /// Ranked hits.
    pub results: Vec<RetrievalResult>,
    /// Dimensions inferred from the query.
    pub relevant_dimensions: BTreeSet<FactDimension>,
}

/// The retrieval engine.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingService>,
    pipelines: PipelineSet,
    classifier: Arc<dyn DimensionClassifier>,
    weights: BoostWeights,
    default_indices: Vec<IndexKind>,
}

impl Retriever {
    /// Create a retriever over `pipelines` using the keyword classifier.
    #[must_use]
    pub fn new(
        pipelines: PipelineSet,
        embedder: Arc<dyn EmbeddingService>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            pipelines,
            classifier: Arc::new(KeywordDimensionClassifier::default()),
            weights: BoostWeights {
                fact_base_weight: config.persona_fact_base_weight,
                dimension_match_boost: config.dimension_match_boost,
            },
            default_indices: config.indices.clone(),
        }
    }

    /// Swap in a different dimension classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn DimensionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Search `indices` for `query_text` and rank the union of hits.
    ///
    /// # Errors
    ///
    /// Propagates embedding errors and
    /// [`AnimaError::DimensionMismatch`](crate::AnimaError::DimensionMismatch)
    /// from any index.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k_per_index: usize,
        indices: &[IndexKind],
        event_type: Option<&str>,
    ) -> Result<RetrievalOutcome> {
        let relevant = self.classifier.classify(query_text, event_type);
        let query = self.embedder.embed_single(query_text).await?;

        let mut results = Vec::new();
        for &kind in indices {
            for hit in self.pipelines.get(kind).search(&query, k_per_index)? {
                let breakdown =
                    scoring::compute_breakdown(&hit.record, hit.similarity, &relevant, self.weights);
                results.push(RetrievalResult {
                    index: hit.index,
                    ordinal: hit.ordinal,
                    record: hit.record,
                    breakdown,
                });
            }
        }
        // `sort_by` is stable: ties keep index-scan order.
        results.sort_by(|a, b| b.score().total_cmp(&a.score()));

        debug!(
            hits = results.len(),
            dimensions = ?relevant,
            "retrieval ranked"
        );
        Ok(RetrievalOutcome {
            query_text: query_text.to_string(),
            indices_searched: indices.to_vec(),
            top_k: k_per_index,
            results,
            relevant_dimensions: relevant,
        })
    }

    /// Retrieve across the configured indices, keeping only what `npc_id`
    /// may see.
    ///
    /// # Errors
    ///
    /// Same as [`retrieve`](Self::retrieve).
    pub async fn retrieve_for_npc(
        &self,
        npc_id: &str,
        query_text: &str,
        k_per_index: usize,
        event_type: Option<&str>,
    ) -> Result<RetrievalOutcome> {
        let mut outcome = self
            .retrieve(query_text, k_per_index, &self.default_indices, event_type)
            .await?;
        outcome.results.retain(|r| r.record.visible_to(npc_id));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnimaConfig;
    use crate::embedding::HashEmbeddingService;
    use crate::memory::PersonaFact;
    use crate::types::SourceType;

    fn setup(dir: &std::path::Path) -> (Retriever, PipelineSet) {
        let mut config = AnimaConfig::default();
        config.storage = crate::config::StorageConfig::rooted_at(dir);
        config.embedding.dimensions = 256;
        let svc: Arc<dyn EmbeddingService> = Arc::new(HashEmbeddingService::new(256));
        let set = PipelineSet::from_config(&config, Arc::clone(&svc));
        (Retriever::new(set.clone(), svc, &config.retrieval), set)
    }

    #[tokio::test]
    async fn empty_indices_yield_empty_outcome() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (retriever, _) = setup(dir.path());
        let out = retriever
            .retrieve("anything at all", 5, &IndexKind::ALL, None)
            .await
            .expect("retrieve");
        assert!(out.results.is_empty());
        assert_eq!(out.indices_searched, IndexKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn episodic_hits_are_filtered_by_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (retriever, set) = setup(dir.path());
        let episodic = set.get(IndexKind::Episodic);
        episodic
            .vectorize_episodic_memory("m_a", "npc_a", "the wolf attacked the farm", 0.9, chrono::Utc::now())
            .await
            .expect("vectorize");
        episodic
            .vectorize_episodic_memory("m_b", "npc_b", "the wolf attacked the farm", 0.9, chrono::Utc::now())
            .await
            .expect("vectorize");

        let out = retriever
            .retrieve_for_npc("npc_a", "wolf attacked farm", 5, None)
            .await
            .expect("retrieve");
        let ids: Vec<&str> = out.results.iter().map(|r| r.record.source_id.as_str()).collect();
        assert_eq!(ids, vec!["m_a"]);
    }

    #[tokio::test]
    async fn relevant_fact_outranks_equal_episodic_hit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (retriever, set) = setup(dir.path());
        set.get(IndexKind::Episodic)
            .vectorize_episodic_memory("m1", "npc_a", "my friend betrayed me", 0.9, chrono::Utc::now())
            .await
            .expect("vectorize");
        let fact = PersonaFact::seeded(
            "p1",
            None,
            crate::types::FactDimension::Relationship,
            "my friend betrayed me",
        );
        set.get(IndexKind::Persona)
            .vectorize_persona_fact(&fact)
            .await
            .expect("vectorize");

        let out = retriever
            .retrieve_for_npc("npc_a", "my friend betrayed me", 5, None)
            .await
            .expect("retrieve");
        assert_eq!(out.results[0].record.source_type, SourceType::PersonaFact);
        assert!(out.results[0].breakdown.dimension_matched);
        assert!(out.relevant_dimensions.contains(&crate::types::FactDimension::Relationship));
    }
}
