//! Similarity Index — append-only vector store with exact cosine search.
//!
//! Vectors are L2-normalised on the way in (stored and query alike) so the
//! inner product equals cosine similarity.  Rows are kept in one flat
//! row-major buffer; ordinals are row numbers and are never reclaimed.
//!
//! Persistence is a whole-file `bincode` overwrite on [`SimilarityIndex::save`],
//! written to a sibling temp file and renamed into place.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::normalize;
use crate::error::{AnimaError, Result};
use crate::types::{Embedding, Ordinal};

/// One search hit: a row ordinal and its cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Row ordinal inside the index.
    pub ordinal: Ordinal,
    /// Cosine similarity in \[-1, 1\].
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimensions: usize,
    vectors: Vec<f32>,
}

/// A named, file-backed exact inner-product index.
#[derive(Debug)]
pub struct SimilarityIndex {
    name: String,
    dimensions: usize,
    path: PathBuf,
    rows: Option<Vec<f32>>,
}

impl SimilarityIndex {
    /// Bind an index named `name` with width `dimensions` under `dir`.
    ///
    /// Nothing is read or created until [`create`](Self::create) or
    /// [`load`](Self::load).
    #[must_use]
    pub fn new(name: &str, dimensions: usize, dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
            path: dir.join(format!("{name}.index")),
            rows: None,
        }
    }

    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured vector width.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Whether the index has been created or loaded in memory.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.rows.is_some()
    }

    /// Number of stored vectors (0 when uninitialised).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.as_ref().map_or(0, |r| r.len() / self.dimensions.max(1))
    }

    /// Whether the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the in-memory index with a new empty one.
    pub fn create(&mut self) {
        debug!(index = %self.name, dims = self.dimensions, "created empty similarity index");
        self.rows = Some(Vec::new());
    }

    /// Load the index from disk.
    ///
    /// Returns `Ok(false)` when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::DimensionMismatch`] if the stored width differs
    /// from the configured width, or a serialization / I/O error if the
    /// file is unreadable.
    pub fn load(&mut self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let file: IndexFile = bincode::deserialize_from(reader)?;
        if file.dimensions != self.dimensions {
            return Err(AnimaError::DimensionMismatch {
                expected: self.dimensions,
                actual: file.dimensions,
            });
        }
        if file.dimensions == 0 || file.vectors.len() % file.dimensions != 0 {
            return Err(AnimaError::Serialization(format!(
                "index file {} is truncated",
                self.path.display()
            )));
        }
        self.rows = Some(file.vectors);
        info!(index = %self.name, vectors = self.len(), "loaded similarity index");
        Ok(true)
    }

    /// Append vectors, returning their ordinals.
    ///
    /// Ordinals are contiguous starting at the current count.  The whole
    /// batch is validated before anything is appended.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::IndexNotInitialized`] before `create`/`load`,
    /// or [`AnimaError::DimensionMismatch`] if any vector has the wrong width.
    pub fn add(&mut self, vectors: &[Embedding]) -> Result<Vec<Ordinal>> {
        let dims = self.dimensions;
        if let Some(bad) = vectors.iter().find(|v| v.dimensions() != dims) {
            return Err(AnimaError::DimensionMismatch {
                expected: dims,
                actual: bad.dimensions(),
            });
        }
        let start = self.len();
        let rows = self
            .rows
            .as_mut()
            .ok_or_else(|| AnimaError::IndexNotInitialized(self.name.clone()))?;
        rows.reserve(vectors.len() * dims);
        for v in vectors {
            let mut row = v.0.clone();
            normalize(&mut row);
            rows.extend_from_slice(&row);
        }
        Ok((start..start + vectors.len()).collect())
    }

    /// Drop every row at or past ordinal `len`.  No-op if already shorter.
    pub fn truncate(&mut self, len: usize) {
        if let Some(rows) = self.rows.as_mut() {
            rows.truncate(len * self.dimensions);
        }
    }

    /// Exact top-`k` search by cosine similarity.
    ///
    /// An empty or uninitialised index yields an empty result.  Equal
    /// scores keep ascending ordinal order.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::DimensionMismatch`] if the query width differs.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>> {
        if query.dimensions() != self.dimensions {
            return Err(AnimaError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.dimensions(),
            });
        }
        let Some(rows) = self.rows.as_ref() else {
            return Ok(Vec::new());
        };
        if rows.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut q = query.0.clone();
        normalize(&mut q);

        // Min-heap of the best k; equal scores prefer the lower ordinal.
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<Ordinal>)>> =
            BinaryHeap::with_capacity(k + 1);
        for (ordinal, row) in rows.chunks_exact(self.dimensions).enumerate() {
            let score: f32 = row.iter().zip(&q).map(|(a, b)| a * b).sum();
            heap.push(Reverse((OrderedFloat(score), Reverse(ordinal))));
            if heap.len() > k {
                heap.pop();
            }
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse((score, Reverse(ordinal)))| SearchHit {
                ordinal,
                score: score.into_inner(),
            })
            .collect())
    }

    /// Overwrite the backing file with the current contents.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::IndexNotInitialized`] if there is nothing to
    /// save, or an I/O / serialization error.
    pub fn save(&self) -> Result<()> {
        let rows = self
            .rows
            .as_ref()
            .ok_or_else(|| AnimaError::IndexNotInitialized(self.name.clone()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("index.tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(
                writer,
                &IndexFile {
                    dimensions: self.dimensions,
                    vectors: rows.clone(),
                },
            )?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(index = %self.name, vectors = self.len(), path = %self.path.display(), "saved similarity index");
        Ok(())
    }
}
