use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use localrag_core::traits::{Embedder, VectorSearch};
use localrag_core::types::{Chunk, ChunkId, DocType, DocumentUnit};
use localrag_core::Error;
use localrag_embed::FakeEmbedder;
use localrag_vector::{EmbeddingCache, IndexBuilder};

/// Wraps the fake embedder and counts embedded texts.
struct Counting {
    inner: FakeEmbedder,
    texts: AtomicUsize,
}

impl Counting {
    fn new() -> Self {
        Self { inner: FakeEmbedder::new(256), texts: AtomicUsize::new(0) }
    }
}

impl Embedder for Counting {
    fn id(&self) -> &str {
        self.inner.id()
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

struct WrongDim;

impl Embedder for WrongDim {
    fn id(&self) -> &str {
        "wrong"
    }
    fn dim(&self) -> usize {
        4
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; 3]).collect())
    }
}

fn chunks(texts: &[&str]) -> Vec<Chunk> {
    let unit = DocumentUnit::new("", "notes.txt", 1, "N/A", DocType::Txt);
    texts.iter().enumerate().map(|(i, t)| Chunk::from_unit(&unit, *t, ChunkId::Structural(i))).collect()
}

const CORPUS: [&str; 4] = [
    "llamas eat grass in the andes",
    "rust ownership and borrowing rules",
    "alpacas and llamas are camelids",
    "tax filing deadlines in april",
];

#[test]
fn search_orders_by_similarity_and_bounds_k() {
    let embedder = Arc::new(Counting::new());
    let index = IndexBuilder::new(embedder, Arc::new(EmbeddingCache::new()))
        .with_batch_size(3)
        .build(chunks(&CORPUS))
        .unwrap();

    assert_eq!(index.count(), 4);
    let hits = index.similarity_search("llamas eat grass", 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.text, CORPUS[0]);
    assert!(hits[0].score >= hits[1].score);

    assert_eq!(index.similarity_search("llamas", 10).unwrap().len(), 4);
    assert!(index.similarity_search("llamas", 0).unwrap().is_empty());
}

#[test]
fn cache_prevents_re_embedding_identical_text() {
    let embedder = Arc::new(Counting::new());
    let cache = Arc::new(EmbeddingCache::new());
    let builder = IndexBuilder::new(embedder.clone(), cache.clone());

    builder.build(chunks(&CORPUS)).unwrap();
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 4);
    assert_eq!(cache.len(), 4);

    builder.build(chunks(&[CORPUS[0], CORPUS[1], "a brand new chunk"])).unwrap();
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 5, "only the new chunk is embedded");
}

#[test]
fn empty_build_is_an_index_error() {
    let builder = IndexBuilder::new(Arc::new(Counting::new()), Arc::new(EmbeddingCache::new()));
    assert!(matches!(builder.build(Vec::new()), Err(Error::Index(_))));
}

#[test]
fn dimension_mismatch_is_an_embedding_error() {
    let builder = IndexBuilder::new(Arc::new(WrongDim), Arc::new(EmbeddingCache::new()));
    let err = builder.build(chunks(&["one"])).unwrap_err();
    assert!(matches!(err, Error::Embedding(msg) if msg.contains("dim 3")));
}
