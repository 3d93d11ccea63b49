//! Vector embedding abstraction layer.
//!
//! The memory engine consumes embeddings through the [`EmbeddingService`]
//! trait.  The production implementation is an HTTP client living in
//! `anima-llm`; this module ships the trait, L2 normalisation, and two
//! deterministic providers used by tests, benches, and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AnimaError, Result};
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
///
/// Implementations must be `Send + Sync` for use from async contexts.
/// Retry with backoff belongs inside the implementation; callers surface
/// whatever error comes back.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Embedding`] if the provider fails, or
    /// [`AnimaError::DimensionMismatch`] if it returns vectors of the
    /// wrong width.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Same as [`EmbeddingService::embed`].
    async fn embed_single(&self, text: &str) -> Result<Embedding> {
        let mut out = self.embed(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| AnimaError::Embedding("provider returned no vectors".into()))
    }

    /// The dimensionality of embeddings produced by this service.
    fn dimensions(&self) -> usize;

    /// A human-readable model name.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// L2-normalise `v` in place.
///
/// A zero-norm vector is left untouched (its norm is treated as 1), so no
/// division by zero can occur.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Check that every vector in `vectors` has width `expected`.
///
/// # Errors
///
/// Returns [`AnimaError::DimensionMismatch`] on the first offender.
pub fn check_dimensions(vectors: &[Embedding], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.dimensions() != expected) {
        Some(bad) => Err(AnimaError::DimensionMismatch {
            expected,
            actual: bad.dimensions(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Stub / zero-vector provider
// ---------------------------------------------------------------------------

/// An embedding service that returns zero vectors.
pub struct StubEmbeddingService {
    dims: usize,
}

impl StubEmbeddingService {
    /// Create a new stub service with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

#[async_trait]
impl EmbeddingService for StubEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|_| Embedding(vec![0.0; self.dims])).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-zero-vector"
    }
}

// ---------------------------------------------------------------------------
// Deterministic hashing provider
// ---------------------------------------------------------------------------

/// A deterministic bag-of-words embedding service.
///
/// Each lowercase alphanumeric token is hashed into a signed bucket and the
/// result is L2-normalised, so texts sharing words are measurably closer.
/// Counts calls and can be told to fail on a marker substring, which makes
/// it the workhorse for tests of the vectorization and turn paths.
pub struct HashEmbeddingService {
    dims: usize,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    failure_marker: Option<String>,
}

impl HashEmbeddingService {
    /// Create a new hashing service.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dims: dimensions.max(1),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            failure_marker: None,
        }
    }

    /// Fail any batch containing a text that includes `marker`.
    #[must_use]
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.failure_marker = Some(marker.into());
        self
    }

    /// Number of `embed` calls served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of individual texts embedded so far.
    #[must_use]
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    /// Embed one text synchronously.
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut v = vec![0.0_f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.to_lowercase().as_bytes());
            // Truncation is fine: only the bucket index matters.
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        Embedding(v)
    }
}

#[async_trait]
impl EmbeddingService for HashEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.failure_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(AnimaError::Embedding(format!(
                    "refusing to embed text containing '{marker}'"
                )));
            }
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash-bag-of-words"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
