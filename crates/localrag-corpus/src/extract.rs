use std::path::Path;
use tracing::debug;

use localrag_core::types::{is_url, DocType, DocumentUnit};
use localrag_core::{Error, Result};

use crate::loader::extension;

/// One page or part as returned by a loader, before metadata is settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub content: String,
    pub source: Option<String>,
    /// Zero-based page number reported by the loader.
    pub page: Option<usize>,
    pub section: Option<String>,
}

impl RawPage {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// `web` for http(s) URLs, else the lowercase file extension (`doc` → `docx`).
pub fn infer_doc_type(path: &str) -> Result<DocType> {
    if is_url(path) {
        return Ok(DocType::Web);
    }
    let ext = extension(path);
    DocType::from_name(&ext)
        .filter(|t| *t != DocType::Web)
        .ok_or_else(|| Error::extraction(path, format!("cannot infer document type from extension '{ext}'")))
}

/// File name for local paths, the URL verbatim for web sources.
pub fn display_source(path: &str) -> String {
    if is_url(path) {
        return path.to_string();
    }
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().to_string())
}

/// Settle metadata for each raw page of the document at `path`.
///
/// Pages are numbered from 1: a loader-reported page `p` becomes `p + 1`,
/// otherwise the position in the list is used.
pub fn extract(pages: Vec<RawPage>, path: &str) -> Result<Vec<DocumentUnit>> {
    let doc_type = infer_doc_type(path)?;
    let units: Vec<DocumentUnit> = pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| {
            let source = page.source.as_deref().map_or_else(|| display_source(path), display_source);
            DocumentUnit::new(
                page.content,
                source,
                page.page.unwrap_or(i) + 1,
                page.section.unwrap_or_else(|| "N/A".to_string()),
                doc_type,
            )
        })
        .collect();
    debug!(path, doc_type = %doc_type, units = units.len(), "extracted document units");
    Ok(units)
}
