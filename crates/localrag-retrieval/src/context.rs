//! Serializing retrieved chunks for the generation stage, and attaching
//! source citations to its answer.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use localrag_core::traits::Generator;
use localrag_core::types::{is_url, Chunk};
use localrag_core::{Error, Result};

use crate::retriever::Retrieved;

pub const NO_ANSWER: &str =
    "I don't have enough information to answer this question based on the provided documents.";

const MAX_HIGHLIGHT_WORDS: usize = 50;

/// Chunk texts joined by a blank line, without citation markup.
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub path: String,
    pub page_info: String,
    pub chunk: String,
    pub highlighted_chunk: String,
}

fn display_name(source: &str) -> String {
    if source.is_empty() || source == "unknown" {
        return "unknown".to_string();
    }
    if is_url(source) {
        return source.to_string();
    }
    std::path::Path::new(source)
        .file_name()
        .map_or_else(|| source.to_string(), |n| n.to_string_lossy().to_string())
}

/// One entry per distinct `(file name, page)`, in retrieval order.
pub fn extract_sources(chunks: &[Chunk], answer: Option<&str>) -> Vec<Source> {
    let pattern = answer.and_then(highlight_pattern);
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for chunk in chunks {
        let path = display_name(&chunk.metadata.source);
        if !seen.insert((path.clone(), chunk.metadata.page)) {
            continue;
        }
        let highlighted_chunk = match &pattern {
            Some(re) => highlight_sentences(&chunk.text, re),
            None => chunk.text.clone(),
        };
        sources.push(Source {
            path,
            page_info: format!("Page {}", chunk.metadata.page),
            chunk: chunk.text.clone(),
            highlighted_chunk,
        });
    }
    sources
}

/// Case-insensitive whole-word pattern over the distinct words longer than
/// three characters in `answer`.
fn highlight_pattern(answer: &str) -> Option<Regex> {
    let lower = answer.to_lowercase();
    let mut seen = HashSet::new();
    let words: Vec<String> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 3 && seen.insert(*w))
        .take(MAX_HIGHLIGHT_WORDS)
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "could not build highlight pattern");
            None
        }
    }
}

fn highlight_sentences(text: &str, pattern: &Regex) -> String {
    split_sentences(text)
        .into_iter()
        .map(|s| if pattern.is_match(s) { format!("<mark>{s}</mark>") } else { s.to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap every sentence of `text` sharing a word (>3 chars) with `answer` in `<mark>`.
pub fn highlight_overlap(text: &str, answer: &str) -> String {
    match highlight_pattern(answer) {
        Some(re) => highlight_sentences(text, &re),
        None => text.to_string(),
    }
}

/// Split after `.`, `!` or `?` followed by whitespace; the punctuation stays.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let mut next = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            next = j + w.len_utf8();
            chars.next();
        }
        if next > end {
            out.push(&text[start..end]);
            start = next;
        }
    }
    out.push(&text[start..]);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Generate an answer over the retrieved chunks. An empty retrieval yields
/// [`NO_ANSWER`] without calling the generator.
pub fn answer_with_sources(generator: &dyn Generator, question: &str, retrieved: Retrieved) -> Result<Answer> {
    let chunks = retrieved.into_chunks();
    if chunks.is_empty() {
        warn!("no documents retrieved for query");
        return Ok(Answer { answer: NO_ANSWER.to_string(), sources: Vec::new() });
    }
    let context = build_context(&chunks);
    let answer = generator
        .generate(&context, question)
        .map_err(|e| Error::Retrieval(format!("generation failed: {e:#}")))?;
    let sources = extract_sources(&chunks, Some(&answer));
    info!(answer_chars = answer.chars().count(), sources = sources.len(), "answer generated");
    Ok(Answer { answer, sources })
}
