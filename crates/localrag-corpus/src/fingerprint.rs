//! Content-derived cache key for a set of configured documents.

use std::path::Path;
use tracing::{debug, warn};

use localrag_core::types::DocumentDescriptor;

/// Hash of the sorted `"{content_or_path}|{enabled}"` parts.
///
/// Parts are sorted after the content keys are computed, so the result
/// depends only on the multiset of contents and flags, never on the order
/// or names of the paths.
///
/// Readable local files contribute a hash of their bytes, so the same
/// content under a different temporary path yields the same fingerprint.
/// URLs, missing files and unreadable files contribute their literal path.
pub fn fingerprint(descriptors: &[DocumentDescriptor]) -> String {
    let mut parts: Vec<String> = descriptors
        .iter()
        .map(|d| format!("{}|{}", content_key(d), d.enabled))
        .collect();
    parts.sort();
    let fp = blake3::hash(parts.join("|").as_bytes()).to_hex().to_string();
    debug!(documents = descriptors.len(), fingerprint = %fp, "computed corpus fingerprint");
    fp
}

fn content_key(descriptor: &DocumentDescriptor) -> String {
    let path = Path::new(&descriptor.path);
    if descriptor.is_url() || !path.is_file() {
        return descriptor.path.clone();
    }
    match std::fs::read(path) {
        Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
        Err(e) => {
            warn!(path = %descriptor.path, error = %e, "could not hash file, using path instead");
            descriptor.path.clone()
        }
    }
}
