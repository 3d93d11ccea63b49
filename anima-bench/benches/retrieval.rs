//! Anima Benchmark Suite
//!
//! Targets on a laptop-class CPU:
//!   index_search_top5_from_2000 ....... < 2ms
//!   retrieval_three_indices_top5 ...... < 5ms
//!   fact_boost_rerank_300_hits ........ < 50μs

use std::collections::BTreeSet;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use anima_core::config::{AnimaConfig, StorageConfig};
use anima_core::embedding::{EmbeddingService, HashEmbeddingService};
use anima_core::index::SimilarityIndex;
use anima_core::memory::{EpisodicMemory, PersonaFact};
use anima_core::metadata::MetadataRecord;
use anima_core::retrieval::dimensions::{DimensionClassifier, KeywordDimensionClassifier};
use anima_core::retrieval::scoring::compute_breakdown;
use anima_core::retrieval::BoostWeights;
use anima_core::{FactDimension, IndexKind, MemorySource, PipelineSet, Retriever, SourceType};

const DIMS: usize = 128;

fn phrase(i: usize) -> String {
    const WORDS: &[&str] = &[
        "market", "guard", "stranger", "coin", "blade", "river", "tavern", "oath", "storm", "harvest",
        "friend", "betray", "always", "remember", "plan",
    ];
    (0..6).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect::<Vec<_>>().join(" ")
}

/// Benchmark: exact cosine search over 2000 rows.
fn bench_index_search(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbeddingService::new(DIMS);
    let mut index = SimilarityIndex::new("bench", DIMS, dir.path());
    index.create();
    let vectors: Vec<_> = (0..2000).map(|i| embedder.embed_text(&phrase(i))).collect();
    index.add(&vectors).expect("add");
    let query = embedder.embed_text("a stranger at the tavern with a blade");

    c.bench_function("index_search_top5_from_2000", |b| {
        b.iter(|| black_box(index.search(black_box(&query), 5).expect("search")));
    });
}

/// Benchmark: full retrieval across the three named indices.
fn bench_retrieval(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = AnimaConfig::default();
    config.storage = StorageConfig::rooted_at(dir.path());
    config.embedding.dimensions = DIMS;
    let embedder: Arc<dyn EmbeddingService> = Arc::new(HashEmbeddingService::new(DIMS));
    let pipelines = PipelineSet::from_config(&config, Arc::clone(&embedder));

    rt.block_on(async {
        for i in 0..300 {
            let npc = format!("npc_{}", i % 4);
            let memory = EpisodicMemory::new(&npc, phrase(i), MemorySource::Observation, 0.9, vec![], 0.7);
            pipelines.get(IndexKind::Episodic).vectorize_memory(&memory).await.expect("episodic");
        }
        let facts: Vec<PersonaFact> = (0..100)
            .map(|i| PersonaFact::seeded("p1", None, FactDimension::ALL[i % 5], phrase(i + 11)))
            .collect();
        pipelines
            .get(IndexKind::Persona)
            .vectorize_persona_facts_bulk(&facts)
            .await
            .expect("facts");
    });
    let retriever = Retriever::new(pipelines, embedder, &config.retrieval);

    c.bench_function("retrieval_three_indices_top5", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    retriever
                        .retrieve_for_npc("npc_1", black_box("do you remember the stranger at the market"), 5, None)
                        .await
                        .expect("retrieve"),
                )
            })
        });
    });
}

/// Benchmark: persona-fact boosting over a pre-scored hit list.
fn bench_rerank(c: &mut Criterion) {
    let classifier = KeywordDimensionClassifier::default();
    let relevant: BTreeSet<FactDimension> =
        classifier.classify("I always trust my friend and remember the past", Some("dialogue"));
    let records: Vec<(MetadataRecord, f32)> = (0..300)
        .map(|i| {
            let fact = PersonaFact::seeded("p1", None, FactDimension::ALL[i % 5], phrase(i));
            #[allow(clippy::cast_precision_loss)]
            let similarity = 1.0 - i as f32 / 300.0;
            let mut record = MetadataRecord::new(SourceType::PersonaFact, &fact.id, None, 1.0, &fact.content);
            record.dimension = Some(fact.dimension);
            (record, similarity)
        })
        .collect();

    c.bench_function("fact_boost_rerank_300_hits", |b| {
        b.iter(|| {
            let mut scored: Vec<f32> = records
                .iter()
                .map(|(r, s)| compute_breakdown(r, *s, &relevant, BoostWeights::default()).adjusted)
                .collect();
            scored.sort_by(|a, b| b.total_cmp(a));
            black_box(scored)
        });
    });
}

criterion_group!(benches, bench_index_search, bench_retrieval, bench_rerank);
criterion_main!(benches);
