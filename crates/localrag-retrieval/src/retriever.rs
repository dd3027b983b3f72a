use tracing::info;

use localrag_core::traits::{Embedder, Reranker, VectorSearch};
use localrag_core::types::{CascadeConfig, Chunk, ScoredCandidate};
use localrag_core::{Error, Result};

use crate::cascade::CascadePlan;
use crate::mmr::diversify;
use crate::rerank::rerank;

/// Outcome of a retrieval: nothing to retrieve, or a non-empty ordered list.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved {
    Empty,
    Ready(Vec<ScoredCandidate>),
}

impl Retrieved {
    fn from_candidates(candidates: Vec<ScoredCandidate>) -> Self {
        if candidates.is_empty() {
            Self::Empty
        } else {
            Self::Ready(candidates)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Ready(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn candidates(&self) -> &[ScoredCandidate] {
        match self {
            Self::Empty => &[],
            Self::Ready(c) => c,
        }
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        match self {
            Self::Empty => Vec::new(),
            Self::Ready(c) => c.into_iter().map(|c| c.chunk).collect(),
        }
    }
}

/// Vector search, then rerank, then MMR, sized by a [`CascadePlan`].
pub struct Retriever<'a> {
    index: &'a dyn VectorSearch,
    reranker: &'a dyn Reranker,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn VectorSearch, reranker: &'a dyn Reranker, embedder: &'a dyn Embedder) -> Self {
        Self { index, reranker, embedder }
    }

    pub fn retrieve(&self, query: &str, config: &CascadeConfig) -> Result<Retrieved> {
        config.validate()?;
        let total_docs = self.index.count();
        let preview: String = query.chars().take(100).collect();
        info!(query = %preview, total_docs, "retrieving");

        match CascadePlan::compute(total_docs, config) {
            CascadePlan::Empty => Ok(Retrieved::Empty),
            CascadePlan::ShortCircuit { k } => {
                let hits = self.index.similarity_search(query, k).map_err(|e| Error::retrieval(&e))?;
                Ok(Retrieved::from_candidates(hits))
            }
            CascadePlan::Full { initial_k, rerank_k, mmr_k } => {
                let initial = self.index.similarity_search(query, initial_k).map_err(|e| Error::retrieval(&e))?;
                info!(returned = initial.len(), initial_k, "initial vector search");
                let reranked =
                    rerank(self.reranker, query, initial, Some(rerank_k)).map_err(|e| Error::retrieval(&e))?;
                info!(returned = reranked.len(), rerank_k, "reranked");
                let selected = diversify(self.embedder, query, reranked, mmr_k, config.lambda_mult)
                    .map_err(|e| Error::retrieval(&e))?;
                info!(returned = selected.len(), mmr_k, "MMR selected");
                Ok(Retrieved::from_candidates(selected))
            }
        }
    }
}
