use localrag_core::traits::Generator;
use localrag_core::types::{Chunk, ChunkId, DocType, DocumentUnit, ScoredCandidate};
use localrag_retrieval::context::{highlight_overlap, NO_ANSWER};
use localrag_retrieval::{answer_with_sources, build_context, extract_sources, Retrieved};

fn chunk(text: &str, source: &str, page: usize, id: usize) -> Chunk {
    let unit = DocumentUnit::new("", source, page, "N/A", DocType::Pdf);
    Chunk::from_unit(&unit, text, ChunkId::Structural(id))
}

struct Echo;

impl Generator for Echo {
    fn generate(&self, context: &str, _question: &str) -> anyhow::Result<String> {
        Ok(format!("Llamas mostly graze. ({} chars of context)", context.len()))
    }
}

struct NeverCalled;

impl Generator for NeverCalled {
    fn generate(&self, _context: &str, _question: &str) -> anyhow::Result<String> {
        panic!("generator must not run without context")
    }
}

#[test]
fn context_joins_with_blank_lines() {
    let chunks = vec![chunk("first", "a.pdf", 1, 0), chunk("second", "a.pdf", 2, 1)];
    assert_eq!(build_context(&chunks), "first\n\nsecond");
    assert_eq!(build_context(&[]), "");
}

#[test]
fn sources_dedupe_by_file_and_page() {
    let chunks = vec![
        chunk("one", "/tmp/upload-123/report.pdf", 2, 0),
        chunk("two", "report.pdf", 2, 1),
        chunk("three", "report.pdf", 3, 2),
        chunk("four", "https://example.com/docs/page", 1, 3),
    ];
    let sources = extract_sources(&chunks, None);
    let keys: Vec<(&str, &str)> = sources.iter().map(|s| (s.path.as_str(), s.page_info.as_str())).collect();
    assert_eq!(
        keys,
        vec![("report.pdf", "Page 2"), ("report.pdf", "Page 3"), ("https://example.com/docs/page", "Page 1")]
    );
    assert_eq!(sources[0].chunk, "one");
    assert_eq!(sources[0].highlighted_chunk, "one");
}

#[test]
fn highlight_marks_whole_sentences_sharing_long_words() {
    let text = "Llamas graze on grass. They are calm! Taxes are due in April.";
    let out = highlight_overlap(text, "Llamas graze daily");
    assert_eq!(out, "<mark>Llamas graze on grass.</mark> They are calm! Taxes are due in April.");
}

#[test]
fn short_answer_words_do_not_highlight() {
    let text = "The cat sat. A dog ran.";
    assert_eq!(highlight_overlap(text, "the cat"), text);
}

#[test]
fn empty_retrieval_answers_without_generating() {
    let answer = answer_with_sources(&NeverCalled, "why?", Retrieved::Empty).unwrap();
    assert_eq!(answer.answer, NO_ANSWER);
    assert!(answer.sources.is_empty());
}

#[test]
fn answer_carries_highlighted_sources() {
    let retrieved = Retrieved::Ready(vec![ScoredCandidate::new(
        chunk("Llamas graze all day. Winters are cold.", "herd.pdf", 4, 0),
        0.9,
    )]);
    let answer = answer_with_sources(&Echo, "what do llamas do?", retrieved).unwrap();
    assert!(answer.answer.starts_with("Llamas mostly graze."));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].page_info, "Page 4");
    assert_eq!(answer.sources[0].highlighted_chunk, "<mark>Llamas graze all day.</mark> Winters are cold.");
}
