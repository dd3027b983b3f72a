use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use localrag_core::config::{expand_path, RerankerConfig};
use localrag_core::traits::Reranker;

use crate::tokenize::{load_tokenizer, pad_batch};

const XLM_R_PAD_ID: u32 = 1;
const RERANK_BATCH: usize = 16;

/// BGE-style cross-encoder: XLM-RoBERTa with a single-logit head over
/// `(query, passage)` pairs. Higher logits mean more relevant.
pub struct CrossEncoder {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl CrossEncoder {
    pub fn load(config: &RerankerConfig) -> Result<Self> {
        let device = crate::select_device();
        let model_dir = resolve_reranker_dir(config)?;
        info!(model_dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let model_config: XLMRobertaConfig = serde_json::from_str(&raw)?;
        let vb = crate::load_weights(&model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &model_config, vb)?;
        Ok(Self { model, tokenizer, device, max_len: config.max_len })
    }

    fn score_chunk(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode((query, t.as_str()), true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let inputs = pad_batch(&encodings, self.max_len, XLM_R_PAD_ID, &self.device)?;
        let logits = self.model.forward(&inputs.input_ids, &inputs.attention_mask, &inputs.token_type_ids)?;
        Ok(logits.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?)
    }
}

impl Reranker for CrossEncoder {
    fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(RERANK_BATCH) {
            scores.extend(self.score_chunk(query, chunk)?);
        }
        Ok(scores)
    }
}

/// Fraction of distinct query words found in the passage (case-insensitive).
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

impl Reranker for LexicalReranker {
    fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let query_lower = query.to_lowercase();
        let words: HashSet<&str> = query_lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Ok(vec![0.0; texts.len()]);
        }
        Ok(texts
            .iter()
            .map(|text| {
                let content = text.to_lowercase();
                let hits = words.iter().filter(|w| content.contains(*w)).count();
                hits as f32 / words.len() as f32
            })
            .collect())
    }
}

fn resolve_reranker_dir(config: &RerankerConfig) -> Result<PathBuf> {
    config
        .model_dir
        .as_deref()
        .map(expand_path)
        .or_else(|| std::env::var("APP_RERANKER_DIR").ok().map(expand_path))
        .into_iter()
        .chain(["../models/bge-reranker-base", "models/bge-reranker-base"].map(PathBuf::from))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Could not locate cross-encoder model directory"))
}

/// The configured cross-encoder, or [`LexicalReranker`] when fakes are
/// requested or no reranker model can be loaded.
pub fn get_default_reranker(config: &RerankerConfig) -> Arc<dyn Reranker> {
    if config.use_fake || crate::use_fake_models() {
        info!("using LexicalReranker");
        return Arc::new(LexicalReranker);
    }
    match CrossEncoder::load(config) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            warn!(error = %e, "cross-encoder unavailable, using lexical overlap scores");
            Arc::new(LexicalReranker)
        }
    }
}
