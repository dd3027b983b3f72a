//! Raw loaders: a local file or a web page in, unprocessed pages out.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use localrag_core::traits::Loader;
use localrag_core::types::{is_url, DocumentUnit};
use localrag_core::{Error, Result};

use crate::extract::{extract, RawPage};
use crate::normalize::normalize_unit;

/// Something that can turn a path or URL into raw pages.
pub trait PageSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<RawPage>>;
}

/// Plain-text formats read straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl PageSource for FileSource {
    fn fetch(&self, path: &str) -> Result<Vec<RawPage>> {
        let ext = extension(path);
        match ext.as_str() {
            "txt" | "md" | "markdown" | "html" | "htm" => {}
            "pdf" | "docx" | "doc" => {
                return Err(Error::load(path, format!("no built-in text extractor for .{ext} files")));
            }
            _ => {
                return Err(Error::load(
                    path,
                    "unsupported document type; provide a TXT, MD or HTML file, a JSON record file, or a URL",
                ));
            }
        }
        let content = read_text(path)?;
        Ok(vec![RawPage::new(content)])
    }
}

/// HTTP(S) pages fetched with a blocking client.
pub struct WebSource {
    client: reqwest::blocking::Client,
}

impl WebSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("localrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::load("web client", e))?;
        Ok(Self { client })
    }
}

impl PageSource for WebSource {
    fn fetch(&self, url: &str) -> Result<Vec<RawPage>> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::load(url, e))?;
        let body = response.text().map_err(|e| Error::load(url, e))?;
        info!(url, bytes = body.len(), "fetched web page");
        Ok(vec![RawPage::new(body).with_source(url)])
    }
}

/// Loader + extractor + normalizer behind the [`Loader`] contract.
///
/// `.json` files hold an array of `{"text", "metadata"}` records and `.jsonl`
/// files one record per line; both skip extraction.
pub struct DocumentLoader {
    files: Box<dyn PageSource>,
    web: Box<dyn PageSource>,
}

impl DocumentLoader {
    pub fn new() -> Result<Self> {
        Ok(Self { files: Box::new(FileSource), web: Box::new(WebSource::new()?) })
    }

    pub fn with_sources(files: Box<dyn PageSource>, web: Box<dyn PageSource>) -> Self {
        Self { files, web }
    }

    fn load_records(&self, path: &str) -> Result<Vec<DocumentUnit>> {
        let raw = read_text(path)?;
        let records: Vec<Value> = if extension(path) == "jsonl" {
            raw.lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::extraction(path, e))?
        } else {
            match serde_json::from_str(&raw).map_err(|e| Error::extraction(path, e))? {
                Value::Array(items) => items,
                other => vec![other],
            }
        };
        records.iter().map(DocumentUnit::from_record).collect()
    }
}

impl Loader for DocumentLoader {
    fn load(&self, path_or_url: &str) -> Result<Vec<DocumentUnit>> {
        let units = if is_url(path_or_url) {
            extract(self.web.fetch(path_or_url)?, path_or_url)?
        } else if matches!(extension(path_or_url).as_str(), "json" | "jsonl") {
            self.load_records(path_or_url)?
        } else {
            extract(self.files.fetch(path_or_url)?, path_or_url)?
        };
        debug!(path = path_or_url, units = units.len(), "loaded document");
        Ok(units.into_iter().map(normalize_unit).collect())
    }
}

pub(crate) fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn read_text(path: &str) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::load(path, e))?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
