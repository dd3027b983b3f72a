//! In-memory embedding cache keyed by `(embedder_id, content_hash)`.
//!
//! Consulted before calling the embedder and written through on misses, so
//! chunk text that survives a rebuild is not embedded twice in one process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<(String, String), Arc<[f32]>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached vectors for the given content hashes, keyed by hash.
    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Arc<[f32]>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        hashes
            .iter()
            .filter_map(|h| {
                entries
                    .get(&(embedder_id.to_string(), h.clone()))
                    .map(|v| (h.clone(), Arc::clone(v)))
            })
            .collect()
    }

    pub fn put_many<'a>(&self, embedder_id: &str, entries: impl IntoIterator<Item = (&'a str, &'a [f32])>) {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (hash, vector) in entries {
            map.insert((embedder_id.to_string(), hash.to_string()), Arc::from(vector));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only `embedder_id` entries whose content hash is in `keep`.
    pub fn retain(&self, embedder_id: &str, keep: &HashSet<String>) {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        map.retain(|(id, hash), _| id == embedder_id && keep.contains(hash));
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_scoped_by_embedder() {
        let cache = EmbeddingCache::new();
        let h = content_hash("hello");
        cache.put_many("a", [(h.as_str(), &[1.0f32, 2.0][..])]);

        assert_eq!(cache.get_many("a", &[h.clone()]).len(), 1);
        assert!(cache.get_many("b", &[h]).is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn retain_drops_other_hashes_and_embedders() {
        let cache = EmbeddingCache::new();
        let (keep, drop) = (content_hash("keep"), content_hash("drop"));
        cache.put_many("a", [(keep.as_str(), &[1.0f32][..]), (drop.as_str(), &[2.0f32][..])]);
        cache.put_many("b", [(keep.as_str(), &[3.0f32][..])]);

        cache.retain("a", &HashSet::from([keep.clone()]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_many("a", &[keep.clone()]).len(), 1);
        assert!(cache.get_many("b", &[keep]).is_empty());
    }
}
