//! Property-Based Tests for Anima Core
//!
//! Uses `proptest` to check index and retrieval invariants under random
//! inputs: index and metadata stay the same length, cosine ranking ignores
//! query magnitude, and tier classification is a pure threshold test.

use proptest::prelude::*;

use anima_core::index::SimilarityIndex;
use anima_core::memory::persona::{contains_content, dedup_key};
use anima_core::memory::PersonaFact;
use anima_core::metadata::{MetadataLog, MetadataRecord};
use anima_core::{Embedding, FactDimension, MemoryTier, SourceType};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const DIMS: usize = 6;

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, DIMS)
}

fn arb_vectors() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(arb_vector(), 1..24)
}

fn nonzero(v: &[f32]) -> bool {
    v.iter().map(|x| x * x).sum::<f32>() > 1e-3
}

// ---------------------------------------------------------------------------
// Index invariants
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn index_and_log_stay_in_lockstep(batches in prop::collection::vec(arb_vectors(), 1..5)) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = SimilarityIndex::new("episodic", DIMS, dir.path());
        let mut log = MetadataLog::new("episodic", dir.path());
        index.create();

        for batch in batches {
            let vectors: Vec<Embedding> = batch.into_iter().map(Embedding::from).collect();
            let ordinals = index.add(&vectors).expect("add");
            for ordinal in ordinals {
                let logged = log.add(MetadataRecord::new(
                    SourceType::Episodic,
                    format!("mem_{ordinal}"),
                    Some("npc_1".into()),
                    0.9,
                    "summary",
                ));
                prop_assert_eq!(ordinal, logged);
                prop_assert_eq!(log.get(logged).map(|r| r.vector_id), Some(ordinal));
            }
            prop_assert_eq!(index.len(), log.len());
        }
    }

    #[test]
    fn ranking_ignores_query_magnitude(
        rows in arb_vectors(),
        query in arb_vector().prop_filter("non-zero query", |v| nonzero(v)),
        scale in 0.01f32..100.0,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = SimilarityIndex::new("world", DIMS, dir.path());
        index.create();
        let vectors: Vec<Embedding> = rows.into_iter().map(Embedding::from).collect();
        index.add(&vectors).expect("add");

        let k = vectors.len();
        let base = index.search(&Embedding::from(query.clone()), k).expect("search");
        let scaled_query: Vec<f32> = query.iter().map(|x| x * scale).collect();
        let scaled = index.search(&Embedding::from(scaled_query), k).expect("search");

        prop_assert_eq!(base.len(), scaled.len());
        for (a, b) in base.iter().zip(&scaled) {
            prop_assert!((a.score - b.score).abs() < 1e-3);
        }
    }

    #[test]
    fn search_is_sorted_and_bounded(
        rows in arb_vectors(),
        query in arb_vector(),
        k in 0usize..30,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = SimilarityIndex::new("persona", DIMS, dir.path());
        index.create();
        let vectors: Vec<Embedding> = rows.into_iter().map(Embedding::from).collect();
        index.add(&vectors).expect("add");

        let hits = index.search(&Embedding::from(query), k).expect("search");
        prop_assert_eq!(hits.len(), k.min(vectors.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for hit in &hits {
            prop_assert!(hit.score <= 1.0 + 1e-4);
            prop_assert!(hit.score >= -1.0 - 1e-4);
        }
    }

    // -----------------------------------------------------------------------
    // Tiering and dedup
    // -----------------------------------------------------------------------

    #[test]
    fn tier_is_a_threshold_test(importance in 0.0f32..=1.0, threshold in 0.0f32..=1.0) {
        let tier = MemoryTier::classify(importance, threshold);
        prop_assert_eq!(tier == MemoryTier::Durable, importance >= threshold);
    }

    #[test]
    fn dedup_ignores_case_and_padding(content in "[a-zA-Z][a-zA-Z ]{0,30}", pad in 0usize..4) {
        let fact = PersonaFact::seeded("p1", None, FactDimension::Preference, content.clone());
        let variant = format!("{}{}{}", " ".repeat(pad), content.to_uppercase(), " ".repeat(pad));
        prop_assert!(contains_content(std::slice::from_ref(&fact), &variant));
        prop_assert_eq!(dedup_key(&variant), dedup_key(&content));
    }
}
