//! localrag-core
//!
//! Domain types, collaborator traits, configuration and the two-phase chunker
//! shared by the indexing and retrieval crates.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
