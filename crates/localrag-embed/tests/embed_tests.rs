use localrag_core::config::EmbeddingConfig;
use localrag_core::traits::Embedder;
use localrag_embed::{get_default_embedder, FakeEmbedder};

fn cos(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let config = EmbeddingConfig { use_fake: true, ..EmbeddingConfig::default() };
    let embedder = get_default_embedder(&config).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_documents(&texts).expect("embed_documents");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert_eq!(embedder.dim(), 1024);
    assert_eq!(embedder.id(), "fake:xxhash64:d1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn overlapping_words_are_closer_than_disjoint_text() {
    let e = FakeEmbedder::new(256);
    let q = e.embed_query("Llamas eat grass").unwrap();
    let near = e.embed_query("what do llamas eat? grass.").unwrap();
    let far = e.embed_query("quarterly revenue projections").unwrap();
    assert!(cos(&q, &near) > cos(&q, &far));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let v = FakeEmbedder::new(8).embed_query("  ").unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}
