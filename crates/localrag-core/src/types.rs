//! Domain types used by the chunker, the vector index and the retrieval stages.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// Inferred type of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Pdf,
    Docx,
    Txt,
    Md,
    Html,
    Web,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Web => "web",
        }
    }

    /// Parse a lowercase type name or file extension. `doc` is treated as `docx`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Md),
            "html" | "htm" => Some(Self::Html),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One loaded page or section of a source document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentUnit {
    pub text: String,
    pub source: String,
    pub page: usize,
    pub section: String,
    pub doc_type: DocType,
}

impl DocumentUnit {
    pub fn new(
        text: impl Into<String>,
        source: impl Into<String>,
        page: usize,
        section: impl Into<String>,
        doc_type: DocType,
    ) -> Self {
        Self { text: text.into(), source: source.into(), page, section: section.into(), doc_type }
    }

    /// Build a unit from a pre-extracted `{"text": .., "metadata": {..}}` record.
    ///
    /// A record without `text` or `metadata`, or whose metadata lacks
    /// `doc_type`, cannot be chunked and is rejected with [`Error::Chunking`].
    pub fn from_record(record: &Value) -> Result<Self> {
        let (Some(text), Some(meta)) = (
            record.get("text").and_then(Value::as_str),
            record.get("metadata").and_then(Value::as_object),
        ) else {
            return Err(Error::Chunking("record must contain 'text' and 'metadata' keys".into()));
        };
        let doc_type = meta
            .get("doc_type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Chunking("metadata must contain 'doc_type'".into()))?;
        let doc_type = DocType::from_name(doc_type)
            .ok_or_else(|| Error::Chunking(format!("unknown doc_type '{doc_type}'")))?;
        let page = meta
            .get("page")
            .and_then(Value::as_u64)
            .and_then(|p| usize::try_from(p).ok())
            .unwrap_or(1);
        Ok(Self {
            text: text.to_string(),
            source: meta.get("source").and_then(Value::as_str).unwrap_or("unknown").to_string(),
            page,
            section: meta.get("section").and_then(Value::as_str).unwrap_or("N/A").to_string(),
            doc_type,
        })
    }
}

/// Identifier of a chunk within its unit.
///
/// Structural chunks are numbered sequentially; token-refined sub-chunks
/// render as `"<parent>-<sub_index>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkId {
    Structural(usize),
    Refined { parent: Box<ChunkId>, sub: usize },
}

impl ChunkId {
    pub fn refined(parent: &ChunkId, sub: usize) -> Self {
        Self::Refined { parent: Box::new(parent.clone()), sub }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural(id) => write!(f, "{id}"),
            Self::Refined { parent, sub } => write!(f, "{parent}-{sub}"),
        }
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Structural(id) => serializer.serialize_u64(*id as u64),
            Self::Refined { .. } => serializer.collect_str(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: usize,
    pub section: String,
    pub doc_type: DocType,
    pub chunk_id: ChunkId,
}

/// A bounded span of document text; the unit stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// A chunk of `unit` carrying the unit's metadata and the given id.
    pub fn from_unit(unit: &DocumentUnit, text: impl Into<String>, chunk_id: ChunkId) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: unit.source.clone(),
                page: unit.page,
                section: unit.section.clone(),
                doc_type: unit.doc_type,
                chunk_id,
            },
        }
    }

    pub fn with_chunk_id(&self, text: impl Into<String>, chunk_id: ChunkId) -> Self {
        Self { text: text.into(), metadata: ChunkMetadata { chunk_id, ..self.metadata.clone() } }
    }
}

/// A chunk with an attached relevance or MMR score. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// A configured source: a local path or an `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub path: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl DocumentDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), enabled: true }
    }

    pub fn disabled(path: impl Into<String>) -> Self {
        Self { path: path.into(), enabled: false }
    }

    pub fn is_url(&self) -> bool {
        is_url(&self.path)
    }
}

pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Stage sizes of the retrieval cascade, as fractions of the upstream stage.
///
/// A `None` percentage yields a stage size of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub initial_pct: Option<f64>,
    pub rerank_pct: Option<f64>,
    pub mmr_pct: Option<f64>,
    pub lambda_mult: f32,
    pub min_chunk: Option<usize>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            initial_pct: Some(0.5),
            rerank_pct: Some(0.5),
            mmr_pct: Some(0.5),
            lambda_mult: 0.5,
            min_chunk: Some(5),
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, pct) in [
            ("initial_pct", self.initial_pct),
            ("rerank_pct", self.rerank_pct),
            ("mmr_pct", self.mmr_pct),
        ] {
            if let Some(p) = pct {
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {p}")));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.lambda_mult) {
            return Err(Error::InvalidConfig(format!(
                "lambda_mult must be within [0, 1], got {}",
                self.lambda_mult
            )));
        }
        Ok(())
    }

    /// Apply per-request overrides on top of this configuration.
    pub fn with_overrides(&self, overrides: &CascadeOverrides) -> Self {
        Self {
            initial_pct: overrides.initial_pct.or(self.initial_pct),
            rerank_pct: overrides.rerank_pct.or(self.rerank_pct),
            mmr_pct: overrides.mmr_pct.or(self.mmr_pct),
            lambda_mult: overrides.lambda_mult.unwrap_or(self.lambda_mult),
            min_chunk: overrides.min_chunk.or(self.min_chunk),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeOverrides {
    pub initial_pct: Option<f64>,
    pub rerank_pct: Option<f64>,
    pub mmr_pct: Option<f64>,
    pub lambda_mult: Option<f32>,
    pub min_chunk: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default)]
    pub overrides: CascadeOverrides,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), overrides: CascadeOverrides::default() }
    }
}
