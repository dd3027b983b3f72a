//! Two-phase chunker.
//!
//! Phase 1 splits each unit along structural boundaries with a character
//! budget and no overlap. Phase 2 re-splits any structural chunk whose token
//! count exceeds `target_chunk_size`, measuring length in tokens and keeping
//! `chunk_overlap` tokens between neighbours.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::TokenCounter;
use crate::types::{Chunk, ChunkId, DocumentUnit};

/// Paragraph break, line break, space, then per-character fallback.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Token budget for refined chunks.
    pub target_chunk_size: usize,
    /// Tokens shared by consecutive refined sub-chunks.
    pub chunk_overlap: usize,
    /// Character budget for the structural pass.
    pub structural_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_chunk_size: 500, chunk_overlap: 100, structural_chunk_size: 2000 }
    }
}

impl ChunkingConfig {
    pub fn new(target_chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { target_chunk_size, chunk_overlap, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_chunk_size == 0 || self.structural_chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk sizes must be positive".into()));
        }
        if self.chunk_overlap >= self.target_chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than target_chunk_size ({})",
                self.chunk_overlap, self.target_chunk_size
            )));
        }
        Ok(())
    }
}

/// Length in Unicode scalar values.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> anyhow::Result<usize> {
        Ok(text.chars().count())
    }
}

/// Rough token estimate (~0.75 words per token) for when no tokenizer is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordHeuristicCounter;

impl TokenCounter for WordHeuristicCounter {
    fn count(&self, text: &str) -> anyhow::Result<usize> {
        let words = text.split_whitespace().count();
        Ok((words as f32 / 0.75).ceil() as usize)
    }
}

/// Recursive separator-based splitter with a pluggable length function.
///
/// The first separator present in the text is used to cut it into pieces,
/// each piece keeping its leading separator. Pieces shorter than
/// `chunk_size` are greedily merged; longer ones are split again with the
/// remaining separators.
pub struct RecursiveSplitter<'a> {
    separators: &'a [&'a str],
    chunk_size: usize,
    chunk_overlap: usize,
    length: &'a dyn TokenCounter,
}

impl<'a> RecursiveSplitter<'a> {
    pub fn new(chunk_size: usize, chunk_overlap: usize, length: &'a dyn TokenCounter) -> Self {
        Self { separators: &DEFAULT_SEPARATORS, chunk_size, chunk_overlap, length }
    }

    pub fn split(&self, text: &str) -> anyhow::Result<Vec<String>> {
        self.split_with(text, self.separators)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> anyhow::Result<Vec<String>> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<(&str, usize)> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            let len = self.length.count(piece)?;
            if len < self.chunk_size {
                small.push((piece, len));
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, remaining)?);
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        Ok(chunks)
    }

    /// Greedily pack pieces into chunks of at most `chunk_size`, carrying up
    /// to `chunk_overlap` of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;
        for &(piece, len) in pieces {
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(total, chunk_size = self.chunk_size, "created a chunk longer than the budget");
                }
                if !window.is_empty() {
                    out.extend(join_window(&window));
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match window.pop_front() {
                            Some((_, dropped)) => total = total.saturating_sub(dropped),
                            None => break,
                        }
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        out.extend(join_window(&window));
        out
    }
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Cut `text` at the start of every occurrence of `separator`, so each piece
/// after the first begins with the separator. An empty separator yields
/// single characters. Empty pieces are dropped.
pub fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

pub struct Chunker<'a> {
    config: ChunkingConfig,
    tokens: &'a dyn TokenCounter,
}

impl<'a> Chunker<'a> {
    pub fn new(config: ChunkingConfig, tokens: &'a dyn TokenCounter) -> Self {
        Self { config, tokens }
    }

    /// Phase 1: structural chunks with sequential ids.
    pub fn structural_split(&self, unit: &DocumentUnit) -> Result<Vec<Chunk>> {
        let splitter = RecursiveSplitter::new(self.config.structural_chunk_size, 0, &CharCounter);
        let pieces = splitter.split(&unit.text).map_err(|e| Error::chunking(&e))?;
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::from_unit(unit, text, ChunkId::Structural(i)))
            .collect())
    }

    /// Phase 2: a chunk within the token budget passes through unchanged;
    /// a longer one is re-split into `<parent>-<j>` sub-chunks.
    pub fn refine(&self, chunk: Chunk) -> Result<Vec<Chunk>> {
        let tokens = self.tokens.count(&chunk.text).map_err(|e| Error::chunking(&e))?;
        if tokens <= self.config.target_chunk_size {
            return Ok(vec![chunk]);
        }
        let splitter =
            RecursiveSplitter::new(self.config.target_chunk_size, self.config.chunk_overlap, self.tokens);
        let pieces = splitter.split(&chunk.text).map_err(|e| Error::chunking(&e))?;
        debug!(chunk_id = %chunk.metadata.chunk_id, tokens, parts = pieces.len(), "refined oversized chunk");
        let parent = chunk.metadata.chunk_id.clone();
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(j, text)| chunk.with_chunk_id(text, ChunkId::refined(&parent, j)))
            .collect())
    }

    pub fn chunk_unit(&self, unit: &DocumentUnit) -> Result<Vec<Chunk>> {
        let mut out = Vec::new();
        for chunk in self.structural_split(unit)? {
            out.extend(self.refine(chunk)?);
        }
        Ok(out)
    }

    pub fn chunk_units(&self, units: &[DocumentUnit]) -> Result<Vec<Chunk>> {
        let mut out = Vec::new();
        for unit in units {
            out.extend(self.chunk_unit(unit)?);
        }
        debug!(units = units.len(), chunks = out.len(), "chunked document units");
        Ok(out)
    }

    /// Chunk pre-extracted `{"text", "metadata"}` records. The first malformed
    /// record aborts with [`Error::Chunking`].
    pub fn chunk_records(&self, records: &[Value]) -> Result<Vec<Chunk>> {
        let units = records.iter().map(DocumentUnit::from_record).collect::<Result<Vec<_>>>()?;
        self.chunk_units(&units)
    }
}
