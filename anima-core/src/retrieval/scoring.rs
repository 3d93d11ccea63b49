//! Re-ranking weights for retrieval hits.
//!
//! Adjusted(h) = sim(h)                           for non-fact hits
//! Adjusted(h) = sim(h) · W + B·[dim(h) ∈ D]      for persona facts
//!
//! where W is the persona-fact base weight, B the dimension-match boost,
//! and D the set of dimensions inferred from the query.

use std::collections::BTreeSet;

use crate::metadata::MetadataRecord;
use crate::retrieval::ScoreBreakdown;
use crate::types::{FactDimension, SourceType};

/// Fact-boost weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostWeights {
    /// Multiplier applied to every persona-fact hit.
    pub fact_base_weight: f32,
    /// Additive boost when the fact's dimension is relevant.
    pub dimension_match_boost: f32,
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self {
            fact_base_weight: 1.2,
            dimension_match_boost: 0.3,
        }
    }
}

/// Compute the adjusted score of one hit.
#[must_use]
pub fn compute_breakdown(
    record: &MetadataRecord,
    similarity: f32,
    relevant: &BTreeSet<FactDimension>,
    weights: BoostWeights,
) -> ScoreBreakdown {
    if record.source_type != SourceType::PersonaFact {
        return ScoreBreakdown {
            similarity,
            fact_weighted: false,
            dimension_matched: false,
            adjusted: similarity,
        };
    }
    let matched = record.dimension.is_some_and(|d| relevant.contains(&d));
    let mut adjusted = similarity * weights.fact_base_weight;
    if matched {
        adjusted += weights.dimension_match_boost;
    }
    ScoreBreakdown {
        similarity,
        fact_weighted: true,
        dimension_matched: matched,
        adjusted,
    }
}
