//! localrag-vector
//!
//! In-memory vector index for a corpus: exact cosine search, a batched build
//! with progress reporting, and a process-lifetime embedding cache.

pub mod build;
pub mod cache;
pub mod index;
pub mod similarity;

pub use build::IndexBuilder;
pub use cache::{content_hash, EmbeddingCache};
pub use index::FlatIndex;
pub use similarity::cosine;
