//! localrag-corpus
//!
//! Turns a list of configured documents into a searchable corpus: loading,
//! extraction, normalization and chunking, fingerprinting for index reuse,
//! and the [`CorpusManager`] that publishes the live corpus state.

pub mod extract;
pub mod fingerprint;
pub mod ingest;
pub mod loader;
pub mod manager;
pub mod normalize;

pub use fingerprint::fingerprint;
pub use ingest::Ingestor;
pub use loader::{DocumentLoader, FileSource, PageSource, WebSource};
pub use manager::{CorpusManager, CorpusSnapshot, CorpusStatus, Prepared, StatusReport};
