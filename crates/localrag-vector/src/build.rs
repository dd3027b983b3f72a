//! Batched index build: embed chunk texts through the cache, then assemble a
//! [`FlatIndex`].

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use localrag_core::traits::Embedder;
use localrag_core::types::Chunk;
use localrag_core::{Error, Result};

use crate::cache::{content_hash, EmbeddingCache};
use crate::index::FlatIndex;

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self { embedder, cache, batch_size: 32 }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Embed every chunk (cache first) and return a fresh index handle.
    pub fn build(&self, chunks: Vec<Chunk>) -> Result<FlatIndex> {
        if chunks.is_empty() {
            return Err(Error::Index("no chunks to index".into()));
        }
        let start = Instant::now();
        let embedder_id = self.embedder.id().to_string();
        let dim = self.embedder.dim();
        let hashes: Vec<String> = chunks.iter().map(|c| content_hash(&c.text)).collect();
        let cached = self.cache.get_many(&embedder_id, &hashes);

        let mut vectors: Vec<Option<Vec<f32>>> =
            hashes.iter().map(|h| cached.get(h).map(|v| v.to_vec())).collect();
        let misses: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        debug!(total = chunks.len(), cached = chunks.len() - misses.len(), "embedding cache lookup");

        let pb = progress_bar(misses.len());
        for batch in misses.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
            let embedded = self.embedder.embed_documents(&texts).map_err(|e| Error::embedding(&e))?;
            for (&i, v) in batch.iter().zip(embedded) {
                if v.len() != dim {
                    return Err(Error::Embedding(format!("embedder returned dim {} (expected {dim})", v.len())));
                }
                vectors[i] = Some(v);
            }
            self.cache.put_many(
                &embedder_id,
                batch.iter().filter_map(|&i| vectors[i].as_deref().map(|v| (hashes[i].as_str(), v))),
            );
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        let vectors: Vec<Vec<f32>> = vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Index("chunk left without an embedding".into())))
            .collect::<Result<_>>()?;
        let index = FlatIndex::new(chunks, vectors, Arc::clone(&self.embedder)).map_err(|e| Error::Index(format!("{e:#}")))?;
        info!(
            chunks = localrag_core::traits::VectorSearch::count(&index),
            embedded = misses.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "vector index built"
        );
        Ok(index)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if !std::io::stderr().is_terminal() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
