use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::path::{Path, PathBuf};
use tokenizers::{Encoding, Tokenizer};
use tracing::{info, warn};

use localrag_core::chunker::WordHeuristicCounter;
use localrag_core::config::{expand_path, EmbeddingConfig, TokenizerConfig};
use localrag_core::traits::TokenCounter;

/// Padded model inputs for one batch.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))
}

/// Truncate to `max_len` and right-pad to the longest encoding in the batch.
pub fn pad_batch(encodings: &[Encoding], max_len: usize, pad_id: u32, device: &Device) -> Result<BatchInputs> {
    let width = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let batch = encodings.len();
    let mut ids = Vec::with_capacity(batch * width);
    let mut mask = Vec::with_capacity(batch * width);
    let mut types = Vec::with_capacity(batch * width);
    for enc in encodings {
        let n = enc.get_ids().len().min(width);
        ids.extend(enc.get_ids()[..n].iter().map(|&id| i64::from(id)));
        mask.extend(enc.get_attention_mask()[..n].iter().map(|&m| i64::from(m)));
        types.extend(enc.get_type_ids()[..n].iter().map(|&t| i64::from(t)));
        let pad = width - n;
        ids.extend(std::iter::repeat(i64::from(pad_id)).take(pad));
        mask.extend(std::iter::repeat(0i64).take(pad));
        types.extend(std::iter::repeat(0i64).take(pad));
    }
    Ok(BatchInputs {
        input_ids: Tensor::from_vec(ids, (batch, width), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, width), device)?,
        token_type_ids: Tensor::from_vec(types, (batch, width), device)?,
    })
}

pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<BatchInputs> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode(t.as_str(), true))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    pad_batch(&encodings, max_len, pad_id, device)
}

/// Token counts from a Hugging Face `tokenizer.json`, without special tokens.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self { tokenizer: load_tokenizer(path)? })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let enc = self.tokenizer.encode(text, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(enc.get_ids().len())
    }
}

/// Configured tokenizer, else the embedding model's, else the word heuristic.
pub fn get_default_token_counter(tokenizer: &TokenizerConfig, embedding: &EmbeddingConfig) -> Box<dyn TokenCounter> {
    let candidate: Option<PathBuf> = tokenizer
        .path
        .as_deref()
        .map(expand_path)
        .or_else(|| crate::resolve_model_dir(embedding).ok().map(|dir| dir.join("tokenizer.json")));
    if let Some(path) = candidate {
        match HfTokenCounter::from_file(&path) {
            Ok(counter) => {
                info!(path = %path.display(), "using model tokenizer for chunk lengths");
                return Box::new(counter);
            }
            Err(e) => warn!(error = %e, "tokenizer unavailable"),
        }
    }
    warn!("falling back to word-count token estimate");
    Box::new(WordHeuristicCounter)
}
