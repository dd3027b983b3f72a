//! localrag-retrieval
//!
//! The query-time cascade: vector search for an initial candidate set,
//! cross-encoder rerank, then MMR diversification, with stage sizes derived
//! from percentages of the corpus.

pub mod cascade;
pub mod context;
pub mod mmr;
pub mod rerank;
pub mod retriever;

pub use cascade::{compute_k, CascadePlan};
pub use context::{answer_with_sources, build_context, extract_sources, Answer, Source};
pub use mmr::{diversify, mmr_select};
pub use rerank::rerank;
pub use retriever::{Retrieved, Retriever};
