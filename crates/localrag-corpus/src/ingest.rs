use std::sync::Arc;
use tracing::{error, info};

use localrag_core::chunker::{Chunker, ChunkingConfig};
use localrag_core::traits::{Loader, TokenCounter};
use localrag_core::types::{Chunk, DocumentDescriptor};
use localrag_core::{Error, Result};

/// Load, extract, normalize and chunk every enabled document.
pub struct Ingestor {
    loader: Arc<dyn Loader>,
    tokens: Arc<dyn TokenCounter>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(loader: Arc<dyn Loader>, tokens: Arc<dyn TokenCounter>, chunking: ChunkingConfig) -> Result<Self> {
        chunking.validate()?;
        Ok(Self { loader, tokens, chunking })
    }

    /// All-or-nothing: the first failing document aborts with
    /// [`Error::Document`] naming its path.
    pub fn ingest(&self, descriptors: &[DocumentDescriptor]) -> Result<Vec<Chunk>> {
        let chunker = Chunker::new(self.chunking.clone(), self.tokens.as_ref());
        let total = descriptors.len();
        let mut all = Vec::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            if !descriptor.enabled {
                info!(path = %descriptor.path, "skipping disabled document");
                continue;
            }
            info!(path = %descriptor.path, "[{}/{}] processing document", i + 1, total);
            let chunks = self
                .loader
                .load(&descriptor.path)
                .and_then(|units| chunker.chunk_units(&units))
                .map_err(|e| {
                    error!(path = %descriptor.path, error = %e, "failed to process document");
                    Error::document(&descriptor.path, e)
                })?;
            info!(path = %descriptor.path, chunks = chunks.len(), "chunked document");
            all.extend(chunks);
        }
        if all.is_empty() {
            return Err(Error::Index(
                "no chunks generated; check that documents are enabled and non-empty".into(),
            ));
        }
        Ok(all)
    }
}
