//! localrag-embed
//!
//! Local model collaborators for indexing and retrieval: the BGE-M3 sentence
//! embedder, a cross-encoder reranker, and a tokenizer-backed token counter,
//! all running on candle. Deterministic fakes stand in when
//! `APP_USE_FAKE_EMBEDDINGS=1` or `use_fake = true` is configured.

pub mod device;
pub mod pool;
pub mod rerank;
pub mod tokenize;

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use localrag_core::config::{expand_path, EmbeddingConfig};
use localrag_core::traits::Embedder;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use rerank::{get_default_reranker, CrossEncoder, LexicalReranker};
pub use tokenize::{get_default_token_counter, HfTokenCounter};

/// `<pad>` id in the XLM-RoBERTa vocabulary.
const XLM_R_PAD_ID: u32 = 1;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl EmbeddingModel {
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(config)?;
        info!(model_dir = %model_dir.display(), "loading embedding model");

        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let model_config: XLMRobertaConfig = serde_json::from_str(&raw)?;
        let dim = hidden_size(&raw)?;

        let vb = load_weights(&model_dir, &device)?;
        let model = XLMRobertaModel::new(&model_config, vb)?;
        let name = model_dir.file_name().map_or_else(|| "model".to_string(), |n| n.to_string_lossy().to_string());
        info!(dim, "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            id: format!("local:{name}:d{dim}"),
            dim,
            max_len: config.max_len,
            batch_size: config.batch_size.max(1),
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, XLM_R_PAD_ID, &self.device)?;
        let hidden = self.model.forward(
            &inputs.input_ids,
            &inputs.attention_mask,
            &inputs.token_type_ids,
            None,
            None,
            None,
        )?;
        let pooled = masked_mean_l2(&hidden, &inputs.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dim) {
            return Err(anyhow!("embedding has dim {} but model reports {}", bad.len(), self.dim));
        }
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis(), "embedded batch");
        Ok(out)
    }
}

/// Hashed bag-of-words embedder for tests and offline runs.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxhash64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        let words = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty());
        for (i, token) in words.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

pub fn use_fake_models() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.use_fake || use_fake_models() {
        info!("using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(1024)));
    }
    Ok(Arc::new(EmbeddingModel::load(config)?))
}

/// Configured `model_dir`, then `APP_MODEL_DIR`/`MODEL_DIR`, then the
/// conventional `models/bge-m3` locations.
pub fn resolve_model_dir(config: &EmbeddingConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.model_dir {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        warn!(model_dir = %p.display(), "configured model_dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() {
                debug!(var, model_dir = %p.display(), "model dir from environment");
                return Ok(p);
            }
        }
    }
    ["../models/bge-m3", "models/bge-m3"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Could not locate BGE-M3 model directory"))
}

/// `model.safetensors` when present, else the PyTorch pickle.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let pickle = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&pickle)
            .with_context(|| format!("reading weights from {}", pickle.display()))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

pub(crate) fn hidden_size(config_json: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(config_json)?;
    value
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .and_then(|h| usize::try_from(h).ok())
        .ok_or_else(|| anyhow!("config.json has no hidden_size"))
}
