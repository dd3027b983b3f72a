use anyhow::{bail, Result};
use std::sync::Arc;

use localrag_core::traits::{Embedder, VectorSearch};
use localrag_core::types::{Chunk, ScoredCandidate};

use crate::similarity::cosine;

/// Exact cosine search over an immutable set of embedded chunks.
pub struct FlatIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("chunks", &self.chunks.len())
            .field("embedder", &self.embedder.id())
            .finish()
    }
}

impl FlatIndex {
    pub fn new(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!("{} chunks but {} vectors", chunks.len(), vectors.len());
        }
        let dim = embedder.dim();
        if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
            bail!("vector of dim {} in an index for dim {dim}", v.len());
        }
        Ok(Self { chunks, vectors, embedder })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Up to `k` chunks by descending cosine to `query_vec`; ties keep index order.
    pub fn search_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<ScoredCandidate> {
        let mut scored: Vec<(usize, f32)> =
            self.vectors.iter().enumerate().map(|(i, v)| (i, cosine(query_vec, v))).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredCandidate::new(self.chunks[i].clone(), score))
            .collect()
    }
}

impl VectorSearch for FlatIndex {
    fn count(&self) -> usize {
        self.chunks.len()
    }

    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredCandidate>> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query)?;
        Ok(self.search_by_vector(&query_vec, k))
    }
}
