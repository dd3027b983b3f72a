use crate::types::{DocumentUnit, ScoredCandidate};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `local:bge-m3:d1024`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for the query"))
    }

    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let vectors = self.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            anyhow::bail!("embedder returned {} vectors for {} texts", vectors.len(), texts.len());
        }
        Ok(vectors)
    }
}

/// Length function used by the chunker.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> anyhow::Result<usize>;
}

/// Cross-encoder style relevance model scoring `(query, text)` pairs.
pub trait Reranker: Send + Sync {
    fn score(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// Nearest-neighbour search over indexed chunks.
pub trait VectorSearch: Send + Sync {
    fn count(&self) -> usize;
    /// Up to `k` chunks ordered by embedding similarity to `query`, best first.
    fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredCandidate>>;
}

/// Turns a path or URL into normalized-ready document units.
pub trait Loader: Send + Sync {
    fn load(&self, path_or_url: &str) -> crate::Result<Vec<DocumentUnit>>;
}

/// Answer generation over a serialized context.
pub trait Generator: Send + Sync {
    fn generate(&self, context: &str, question: &str) -> anyhow::Result<String>;
}
