//! Greedy maximal-marginal-relevance selection.

use anyhow::Result;

use localrag_core::traits::Embedder;
use localrag_core::types::ScoredCandidate;
use localrag_vector::cosine;

/// Indices of up to `k` distinct vectors in selection order, each with the
/// score it was picked on (plain relevance for the first pick).
///
/// After the first pick, a candidate scores
/// `lambda * cos(query, c) - (1 - lambda) * max_{s in selected} cos(c, s)`.
/// On ties the earliest candidate wins.
pub fn mmr_select(query_vec: &[f32], doc_vecs: &[Vec<f32>], k: usize, lambda_mult: f32) -> Vec<(usize, f32)> {
    let relevance: Vec<f32> = doc_vecs.iter().map(|v| cosine(query_vec, v)).collect();
    let mut redundancy = vec![f32::NEG_INFINITY; doc_vecs.len()];
    let mut remaining: Vec<usize> = (0..doc_vecs.len()).collect();
    let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k.min(doc_vecs.len()));

    while !remaining.is_empty() && selected.len() < k {
        let score = |idx: usize| {
            if selected.is_empty() {
                relevance[idx]
            } else {
                lambda_mult * relevance[idx] - (1.0 - lambda_mult) * redundancy[idx]
            }
        };
        let mut best_pos = 0;
        let mut best_score = score(remaining[0]);
        for (pos, &idx) in remaining.iter().enumerate().skip(1) {
            let s = score(idx);
            if s > best_score {
                best_pos = pos;
                best_score = s;
            }
        }
        let chosen = remaining.remove(best_pos);
        for &idx in &remaining {
            redundancy[idx] = redundancy[idx].max(cosine(&doc_vecs[idx], &doc_vecs[chosen]));
        }
        selected.push((chosen, best_score));
    }
    selected
}

/// Embed the query once and the candidates in one batch, then keep the MMR
/// selection of `k` candidates in selection order.
pub fn diversify(
    embedder: &dyn Embedder,
    query: &str,
    candidates: Vec<ScoredCandidate>,
    k: usize,
    lambda_mult: f32,
) -> Result<Vec<ScoredCandidate>> {
    if candidates.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query_vec = embedder.embed_query(query)?;
    let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
    let doc_vecs = embedder.embed_documents(&texts)?;

    let mut slots: Vec<Option<ScoredCandidate>> = candidates.into_iter().map(Some).collect();
    Ok(mmr_select(&query_vec, &doc_vecs, k, lambda_mult)
        .into_iter()
        .filter_map(|(idx, score)| slots[idx].take().map(|c| ScoredCandidate::new(c.chunk, score)))
        .collect())
}
