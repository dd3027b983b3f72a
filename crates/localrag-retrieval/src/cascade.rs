//! Stage sizes for the retrieval cascade.

use tracing::{info, warn};

use localrag_core::types::CascadeConfig;

/// `ceil(total * pct)` clamped to `[0, upper_bound]`; zero when `pct` is unset
/// or `total` is zero.
pub fn compute_k(total: usize, pct: Option<f64>, upper_bound: usize) -> usize {
    let Some(pct) = pct else { return 0 };
    if total == 0 {
        return 0;
    }
    let k = (total as f64 * pct).ceil();
    if k.is_nan() || k <= 0.0 {
        return 0;
    }
    if k >= upper_bound as f64 {
        return upper_bound;
    }
    k as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePlan {
    /// Nothing to retrieve.
    Empty,
    /// Small corpus: plain similarity search for every chunk.
    ShortCircuit { k: usize },
    Full { initial_k: usize, rerank_k: usize, mmr_k: usize },
}

impl CascadePlan {
    pub fn compute(total_docs: usize, config: &CascadeConfig) -> Self {
        if total_docs == 0 {
            warn!("vector index is empty, nothing to retrieve");
            return Self::Empty;
        }
        if let Some(min_chunk) = config.min_chunk {
            if total_docs <= min_chunk {
                info!(total_docs, min_chunk, "small corpus, skipping rerank and MMR");
                return Self::ShortCircuit { k: total_docs };
            }
        }

        let initial_k = compute_k(total_docs, config.initial_pct, total_docs);
        if initial_k == 0 {
            warn!(total_docs, "computed initial_k is 0, nothing to retrieve");
            return Self::Empty;
        }
        let mut rerank_k = compute_k(initial_k, config.rerank_pct, initial_k);
        if rerank_k == 0 {
            rerank_k = initial_k.min(1);
            warn!(initial_k, rerank_k, "computed rerank_k is 0, flooring");
        }
        let mut mmr_k = compute_k(rerank_k, config.mmr_pct, rerank_k);
        if mmr_k == 0 {
            mmr_k = rerank_k.min(1);
            warn!(rerank_k, mmr_k, "computed mmr_k is 0, flooring");
        }
        info!(total_docs, initial_k, rerank_k, mmr_k, "cascade plan");
        Self::Full { initial_k, rerank_k, mmr_k }
    }
}
