use serde_json::json;

use localrag_core::types::{
    CascadeConfig, CascadeOverrides, ChunkId, DocType, DocumentDescriptor, DocumentUnit,
};
use localrag_core::Error;

#[test]
fn record_defaults_fill_missing_metadata() {
    let unit = DocumentUnit::from_record(&json!({
        "text": "body",
        "metadata": {"doc_type": "MD"}
    }))
    .unwrap();
    assert_eq!(unit.doc_type, DocType::Md);
    assert_eq!(unit.source, "unknown");
    assert_eq!(unit.page, 1);
    assert_eq!(unit.section, "N/A");
}

#[test]
fn record_without_doc_type_is_rejected() {
    let err = DocumentUnit::from_record(&json!({"text": "x", "metadata": {"source": "a.txt"}})).unwrap_err();
    assert!(matches!(err, Error::Chunking(msg) if msg.contains("doc_type")));

    let err = DocumentUnit::from_record(&json!({"metadata": {"doc_type": "txt"}})).unwrap_err();
    assert!(matches!(err, Error::Chunking(_)));

    let err = DocumentUnit::from_record(&json!({"text": "x", "metadata": {"doc_type": "exe"}})).unwrap_err();
    assert!(matches!(err, Error::Chunking(msg) if msg.contains("exe")));
}

#[test]
fn chunk_ids_render_parent_and_sub_index() {
    let parent = ChunkId::Structural(3);
    let sub = ChunkId::refined(&parent, 1);
    assert_eq!(parent.to_string(), "3");
    assert_eq!(sub.to_string(), "3-1");
    assert_eq!(ChunkId::refined(&sub, 0).to_string(), "3-1-0");

    assert_eq!(serde_json::to_value(&parent).unwrap(), json!(3));
    assert_eq!(serde_json::to_value(&sub).unwrap(), json!("3-1"));
}

#[test]
fn doc_is_treated_as_docx() {
    assert_eq!(DocType::from_name("DOC"), Some(DocType::Docx));
    assert_eq!(DocType::from_name("htm"), Some(DocType::Html));
    assert_eq!(DocType::from_name("zip"), None);
}

#[test]
fn descriptors_default_to_enabled() {
    let d: DocumentDescriptor = serde_json::from_value(json!({"path": "https://example.com/a"})).unwrap();
    assert!(d.enabled);
    assert!(d.is_url());
    assert!(!DocumentDescriptor::disabled("/tmp/a.txt").is_url());
}

#[test]
fn overrides_replace_only_given_fields() {
    let base = CascadeConfig::default();
    let merged = base.with_overrides(&CascadeOverrides {
        rerank_pct: Some(1.0),
        min_chunk: Some(0),
        ..CascadeOverrides::default()
    });
    assert_eq!(merged.initial_pct, base.initial_pct);
    assert_eq!(merged.rerank_pct, Some(1.0));
    assert_eq!(merged.min_chunk, Some(0));
    assert!((merged.lambda_mult - base.lambda_mult).abs() < f32::EPSILON);
}

#[test]
fn cascade_validation_bounds() {
    assert!(CascadeConfig::default().validate().is_ok());
    let bad = CascadeConfig { initial_pct: Some(-0.1), ..CascadeConfig::default() };
    assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    let bad = CascadeConfig { lambda_mult: 1.2, ..CascadeConfig::default() };
    assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    let none = CascadeConfig { mmr_pct: None, ..CascadeConfig::default() };
    assert!(none.validate().is_ok());
}
