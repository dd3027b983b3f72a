use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not load document {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("could not extract document {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("a build for corpus {fingerprint} is already in progress")]
    BuildInProgress { fingerprint: String },

    #[error("error processing document {path}: {source}")]
    Document {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Load { path: path.into(), reason: reason.to_string() }
    }

    pub fn extraction(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Extraction { path: path.into(), reason: reason.to_string() }
    }

    /// Wrap a per-document failure so the offending path is named.
    pub fn document(path: impl Into<String>, source: Error) -> Self {
        Self::Document { path: path.into(), source: Box::new(source) }
    }

    pub fn embedding(err: &anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    pub fn chunking(err: &anyhow::Error) -> Self {
        Self::Chunking(format!("{err:#}"))
    }

    pub fn retrieval(err: &anyhow::Error) -> Self {
        Self::Retrieval(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
