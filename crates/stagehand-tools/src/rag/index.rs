//! Exact nearest-neighbour search over one document's chunks.

use std::sync::Arc;

use stagehand_llm::squared_euclidean_distance;

use crate::error::{Result, ToolError};

/// Indexes with at least this many vectors are searched on the blocking pool.
pub const BLOCKING_SEARCH_THRESHOLD: usize = 2048;

/// Brute-force L2 index. Vectors are stored contiguously in insertion order.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimensions: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector. Its position is the previous `len()`.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(ToolError::internal(format!(
                "embedding has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// The `k` nearest positions with their squared L2 distance, nearest
    /// first. Returns fewer than `k` when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.dimensions == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimensions)
            .map(|vector| squared_euclidean_distance(query, vector))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

/// A chunk returned by retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Position of the chunk in the document.
    pub position: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
    pub text: String,
}

/// A document's vector index together with its chunks.
///
/// Position `i` in the index is always `chunks[i]`: both are built in one
/// step and never modified afterwards.
#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    index: FlatL2Index,
    chunks: Vec<String>,
}

impl RetrievalIndex {
    /// Build from chunks and their embeddings, given in the same order.
    pub fn build(chunks: Vec<String>, embeddings: Vec<Vec<f32>>, dimensions: usize) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(ToolError::internal(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut index = FlatL2Index::new(dimensions);
        for embedding in &embeddings {
            index.add(embedding)?;
        }

        Ok(Self { index, chunks })
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// The `k` chunks nearest to `query`, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedChunk> {
        self.index
            .search(query, k)
            .into_iter()
            .filter_map(|(position, distance)| {
                self.chunks.get(position).map(|text| RetrievedChunk {
                    position,
                    distance,
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Like [`search`](Self::search), but large indexes are scanned on the
    /// blocking pool.
    pub async fn search_async(
        self: &Arc<Self>,
        query: Vec<f32>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if self.len() < BLOCKING_SEARCH_THRESHOLD {
            return Ok(self.search(&query, k));
        }

        let index = Arc::clone(self);
        tokio::task::spawn_blocking(move || index.search(&query, k))
            .await
            .map_err(|e| ToolError::internal(format!("index search task failed: {e}")))
    }
}
