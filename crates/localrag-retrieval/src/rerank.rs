use anyhow::{bail, Result};

use localrag_core::traits::Reranker;
use localrag_core::types::ScoredCandidate;

/// Score every candidate against `query`, sort best first and keep `top_k`.
///
/// Equal scores keep their input order. NaN scores sort last.
pub fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<ScoredCandidate>,
    top_k: Option<usize>,
) -> Result<Vec<ScoredCandidate>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
    let scores = reranker.score(query, &texts)?;
    if scores.len() != candidates.len() {
        bail!("reranker returned {} scores for {} candidates", scores.len(), candidates.len());
    }
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(c, s)| ScoredCandidate::new(c.chunk, if s.is_nan() { f32::NEG_INFINITY } else { s }))
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(k) = top_k {
        scored.truncate(k);
    }
    Ok(scored)
}
