use proptest::prelude::*;
use serde_json::json;

use localrag_core::chunker::{
    split_keeping_separator, ChunkingConfig, Chunker, RecursiveSplitter, WordHeuristicCounter,
};
use localrag_core::traits::TokenCounter;
use localrag_core::types::{ChunkId, DocType, DocumentUnit};
use localrag_core::Error;

/// One token per whitespace-separated word.
struct Words;

impl TokenCounter for Words {
    fn count(&self, text: &str) -> anyhow::Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

struct Broken;

impl TokenCounter for Broken {
    fn count(&self, _text: &str) -> anyhow::Result<usize> {
        anyhow::bail!("tokenizer unavailable")
    }
}

fn unit(text: &str) -> DocumentUnit {
    DocumentUnit::new(text, "guide.md", 3, "Intro", DocType::Md)
}

fn numbered_words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

fn non_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn short_unit_becomes_single_chunk_with_metadata() {
    let chunker = Chunker::new(ChunkingConfig::default(), &Words);
    let chunks = chunker.chunk_unit(&unit("Short text about llamas.")).unwrap();

    assert_eq!(chunks.len(), 1);
    let c = &chunks[0];
    assert_eq!(c.text, "Short text about llamas.");
    assert_eq!(c.metadata.chunk_id, ChunkId::Structural(0));
    assert_eq!(c.metadata.source, "guide.md");
    assert_eq!(c.metadata.page, 3);
    assert_eq!(c.metadata.section, "Intro");
    assert_eq!(c.metadata.doc_type, DocType::Md);
}

#[test]
fn empty_unit_yields_no_chunks() {
    let chunker = Chunker::new(ChunkingConfig::default(), &Words);
    assert!(chunker.chunk_unit(&unit("   \n\n  ")).unwrap().is_empty());
}

#[test]
fn structural_pass_breaks_on_paragraphs_under_char_budget() {
    let para = "a ".repeat(450);
    let para = para.trim();
    let text = format!("{para}\n\n{para}\n\n{para}");
    let chunker = Chunker::new(ChunkingConfig::default(), &Words);

    let chunks = chunker.structural_split(&unit(&text)).unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, format!("{para}\n\n{para}"));
    assert_eq!(chunks[1].text, para);
    assert_eq!(chunks[1].metadata.chunk_id, ChunkId::Structural(1));
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 2000));
}

#[test]
fn oversized_chunk_is_refined_with_composite_ids_and_overlap() {
    let chunker = Chunker::new(ChunkingConfig::new(10, 2), &Words);

    let chunks = chunker.chunk_unit(&unit(&numbered_words(30))).unwrap();

    let ids: Vec<String> = chunks.iter().map(|c| c.metadata.chunk_id.to_string()).collect();
    assert_eq!(ids, vec!["0-0", "0-1", "0-2", "0-3"]);
    assert!(chunks[0].text.starts_with("w0 ") && chunks[0].text.ends_with(" w9"));
    assert!(chunks[1].text.starts_with("w8 w9 w10"), "two words of overlap: {}", chunks[1].text);
    assert!(chunks[3].text.ends_with("w29"));
    for c in &chunks {
        assert!(Words.count(&c.text).unwrap() <= 10);
        assert_eq!(c.metadata.source, "guide.md");
    }
}

#[test]
fn within_budget_chunk_passes_through_unchanged() {
    let chunker = Chunker::new(ChunkingConfig::new(10, 2), &Words);
    let chunk = chunker.structural_split(&unit("one two three")).unwrap().remove(0);

    let refined = chunker.refine(chunk.clone()).unwrap();
    assert_eq!(refined, vec![chunk.clone()]);

    let again = chunker.refine(refined[0].clone()).unwrap();
    assert_eq!(again, vec![chunk]);
}

#[test]
fn refined_chunks_serialize_ids_as_strings() {
    let chunker = Chunker::new(ChunkingConfig::new(4, 0), &Words);
    let chunks = chunker.chunk_unit(&unit(&numbered_words(8))).unwrap();
    let v = serde_json::to_value(&chunks[1].metadata).unwrap();
    assert_eq!(v["chunk_id"], json!("0-1"));
}

#[test]
fn tokenizer_failure_is_a_chunking_error() {
    let chunker = Chunker::new(ChunkingConfig::default(), &Broken);
    let err = chunker.chunk_unit(&unit("anything")).unwrap_err();
    assert!(matches!(err, Error::Chunking(msg) if msg.contains("tokenizer unavailable")));
}

#[test]
fn malformed_record_aborts_chunking() {
    let chunker = Chunker::new(ChunkingConfig::default(), &Words);
    let records = vec![
        json!({"text": "fine", "metadata": {"doc_type": "txt"}}),
        json!({"text": "no metadata"}),
    ];
    let err = chunker.chunk_records(&records).unwrap_err();
    assert!(matches!(err, Error::Chunking(msg) if msg.contains("'text' and 'metadata'")));
}

#[test]
fn records_with_metadata_are_chunked() {
    let chunker = Chunker::new(ChunkingConfig::default(), &Words);
    let records = vec![json!({
        "text": "Alpha paragraph.\n\nBeta paragraph.",
        "metadata": {"doc_type": "txt", "source": "notes.txt", "page": 2}
    })];
    let chunks = chunker.chunk_records(&records).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.source, "notes.txt");
    assert_eq!(chunks[0].metadata.page, 2);
    assert_eq!(chunks[0].metadata.section, "N/A");
}

#[test]
fn separator_stays_at_start_of_following_piece() {
    assert_eq!(split_keeping_separator("a\n\nb\n\nc", "\n\n"), vec!["a", "\n\nb", "\n\nc"]);
    assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    assert_eq!(split_keeping_separator("héj", ""), vec!["h", "é", "j"]);
}

#[test]
fn splitter_falls_back_to_characters_for_long_runs() {
    let splitter = RecursiveSplitter::new(4, 0, &localrag_core::chunker::CharCounter);
    let parts = splitter.split("abcdefghij").unwrap();
    assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn word_heuristic_rounds_up() {
    assert_eq!(WordHeuristicCounter.count("one two three").unwrap(), 4);
    assert_eq!(WordHeuristicCounter.count("").unwrap(), 0);
}

proptest! {
    #[test]
    fn every_chunk_fits_the_token_budget(
        text in "([a-z]{1,8}[ \n]{1,3}){0,150}",
        target in 2usize..20,
        overlap_frac in 0.0f64..0.9,
    ) {
        let overlap = ((target as f64) * overlap_frac) as usize;
        let chunker = Chunker::new(ChunkingConfig::new(target, overlap), &Words);
        for c in chunker.chunk_unit(&unit(&text)).unwrap() {
            prop_assert!(Words.count(&c.text).unwrap() <= target, "chunk over budget: {:?}", c.text);
        }
    }

    #[test]
    fn chunks_without_overlap_cover_the_text(
        text in "[a-zA-Z.,]{1,12}([ \n]{1,3}[a-zA-Z.,]{1,12}){0,120}",
        target in 2usize..15,
        structural in 20usize..200,
    ) {
        let config = ChunkingConfig { target_chunk_size: target, chunk_overlap: 0, structural_chunk_size: structural };
        let chunker = Chunker::new(config, &Words);
        let joined: String = chunker.chunk_unit(&unit(&text)).unwrap().iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(non_ws(&joined), non_ws(&text));
    }
}
