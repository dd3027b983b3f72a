//! Owner of the single live corpus state.
//!
//! Readers clone an immutable [`CorpusSnapshot`] and never hold the lock while
//! working. A rebuild drops the old index when it publishes `processing`,
//! builds the replacement into a separate handle, and publishes `ready` (or
//! `error`) in one write. At most one build runs at a time.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use localrag_core::traits::{Reranker, VectorSearch};
use localrag_core::types::{CascadeConfig, DocumentDescriptor, RetrievalRequest};
use localrag_core::{Error, Result};
use localrag_retrieval::{Retrieved, Retriever};
use localrag_vector::{content_hash, FlatIndex, IndexBuilder};

use crate::extract::display_source;
use crate::fingerprint::fingerprint;
use crate::ingest::Ingestor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusStatus {
    Idle,
    Processing,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedDocument {
    pub name: String,
    pub path: String,
}

/// One published corpus state. `fingerprint` and `index` are set only when
/// the status is `ready`; `error` only when it is `error`.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    pub status: CorpusStatus,
    pub fingerprint: Option<String>,
    pub documents: Vec<DocumentDescriptor>,
    pub error: Option<String>,
    index: Option<Arc<FlatIndex>>,
}

impl CorpusSnapshot {
    fn idle() -> Self {
        Self { status: CorpusStatus::Idle, fingerprint: None, documents: Vec::new(), error: None, index: None }
    }

    fn processing(documents: Vec<DocumentDescriptor>) -> Self {
        Self { status: CorpusStatus::Processing, documents, ..Self::idle() }
    }

    pub fn index(&self) -> Option<&Arc<FlatIndex>> {
        self.index.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.status == CorpusStatus::Ready && self.index.is_some()
    }

    pub fn loaded_documents(&self) -> Vec<LoadedDocument> {
        self.documents
            .iter()
            .map(|d| LoadedDocument { name: display_source(&d.path), path: d.path.clone() })
            .collect()
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: self.status,
            fingerprint: self.fingerprint.clone(),
            documents: self.loaded_documents(),
            chunks: self.index.as_ref().map_or(0, |i| i.count()),
            error: self.error.clone(),
        }
    }
}

/// Serializable view of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: CorpusStatus,
    pub fingerprint: Option<String>,
    pub documents: Vec<LoadedDocument>,
    pub chunks: usize,
    pub error: Option<String>,
}

/// Clears the in-flight slot when the build ends, however it ends.
struct BuildGuard {
    slot: Arc<Mutex<Option<String>>>,
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub struct BuildJob {
    fingerprint: String,
    descriptors: Vec<DocumentDescriptor>,
    guard: BuildGuard,
}

impl BuildJob {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

pub enum Prepared {
    /// The live index already matches this corpus.
    Reuse(Arc<CorpusSnapshot>),
    /// A build for this same corpus is already running.
    Coalesced(Arc<CorpusSnapshot>),
    /// The caller owns the build; `processing` has been published.
    Build(BuildJob),
}

pub struct CorpusManager {
    ingestor: Ingestor,
    builder: IndexBuilder,
    reranker: Arc<dyn Reranker>,
    cascade: CascadeConfig,
    state: RwLock<Arc<CorpusSnapshot>>,
    in_flight: Arc<Mutex<Option<String>>>,
}

impl CorpusManager {
    pub fn new(ingestor: Ingestor, builder: IndexBuilder, reranker: Arc<dyn Reranker>) -> Self {
        Self {
            ingestor,
            builder,
            reranker,
            cascade: CascadeConfig::default(),
            state: RwLock::new(Arc::new(CorpusSnapshot::idle())),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_cascade(mut self, cascade: CascadeConfig) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn status(&self) -> Arc<CorpusSnapshot> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, snapshot: CorpusSnapshot) -> Arc<CorpusSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        snapshot
    }

    /// Apply the reuse-or-rebuild rule without doing the build.
    pub fn prepare(&self, descriptors: &[DocumentDescriptor]) -> Result<Prepared> {
        if descriptors.is_empty() {
            return Err(Error::InvalidConfig("no documents configured for processing".into()));
        }
        let fp = fingerprint(descriptors);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = in_flight.as_deref() {
            if running == fp {
                info!(fingerprint = %fp, "build for this corpus already running");
                return Ok(Prepared::Coalesced(self.status()));
            }
            return Err(Error::BuildInProgress { fingerprint: running.to_string() });
        }

        let current = self.status();
        if current.is_ready() && current.fingerprint.as_deref() == Some(fp.as_str()) {
            info!(fingerprint = %fp, "reusing existing index for unchanged documents");
            return Ok(Prepared::Reuse(current));
        }

        info!(fingerprint = %fp, previous = ?current.fingerprint, "dropping old index and rebuilding");
        *in_flight = Some(fp.clone());
        self.publish(CorpusSnapshot::processing(descriptors.to_vec()));
        Ok(Prepared::Build(BuildJob {
            fingerprint: fp,
            descriptors: descriptors.to_vec(),
            guard: BuildGuard { slot: Arc::clone(&self.in_flight) },
        }))
    }

    /// Run a prepared build to completion and publish its outcome.
    pub fn run(&self, job: BuildJob) -> Result<Arc<CorpusSnapshot>> {
        let BuildJob { fingerprint, descriptors, guard } = job;
        let built = self.ingestor.ingest(&descriptors).and_then(|chunks| self.builder.build(chunks));
        let outcome = match built {
            Ok(index) => {
                self.prune_cache(&index);
                info!(fingerprint = %fingerprint, chunks = index.count(), "corpus ready");
                Ok(self.publish(CorpusSnapshot {
                    status: CorpusStatus::Ready,
                    fingerprint: Some(fingerprint),
                    documents: descriptors,
                    error: None,
                    index: Some(Arc::new(index)),
                }))
            }
            Err(e) => {
                error!(fingerprint = %fingerprint, error = %e, "corpus build failed");
                self.publish(CorpusSnapshot {
                    status: CorpusStatus::Error,
                    documents: descriptors,
                    error: Some(e.to_string()),
                    ..CorpusSnapshot::idle()
                });
                Err(e)
            }
        };
        drop(guard);
        outcome
    }

    /// Drop cached embeddings of chunks that are no longer indexed.
    fn prune_cache(&self, index: &FlatIndex) {
        let keep: HashSet<String> = index.chunks().iter().map(|c| content_hash(&c.text)).collect();
        let cache = self.builder.cache();
        let before = cache.len();
        cache.retain(self.builder.embedder().id(), &keep);
        debug!(before, after = cache.len(), "pruned embedding cache");
    }

    /// Reuse the live index if the corpus is unchanged, otherwise rebuild in
    /// the calling thread.
    pub fn build_or_reuse_index(&self, descriptors: &[DocumentDescriptor]) -> Result<Arc<CorpusSnapshot>> {
        match self.prepare(descriptors)? {
            Prepared::Reuse(snapshot) | Prepared::Coalesced(snapshot) => Ok(snapshot),
            Prepared::Build(job) => self.run(job),
        }
    }

    /// Like [`build_or_reuse_index`](Self::build_or_reuse_index) but runs the
    /// build on a background thread and returns the `processing` snapshot.
    pub fn request_build(self: &Arc<Self>, descriptors: &[DocumentDescriptor]) -> Result<Arc<CorpusSnapshot>> {
        let job = match self.prepare(descriptors)? {
            Prepared::Reuse(snapshot) | Prepared::Coalesced(snapshot) => return Ok(snapshot),
            Prepared::Build(job) => job,
        };
        let processing = self.status();
        let manager = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("corpus-build".into())
            .spawn(move || {
                // failures are published as the error state
                let _ = manager.run(job);
            });
        if let Err(e) = spawned {
            let detail = format!("could not start background build: {e}");
            warn!(error = %e, "could not start background build");
            self.publish(CorpusSnapshot {
                status: CorpusStatus::Error,
                documents: descriptors.to_vec(),
                error: Some(detail.clone()),
                ..CorpusSnapshot::idle()
            });
            return Err(Error::Index(detail));
        }
        Ok(processing)
    }

    /// Drop the index, the cached embeddings and the corpus (ready/error → idle).
    pub fn cleanup(&self) -> Result<Arc<CorpusSnapshot>> {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = in_flight.as_deref() {
            return Err(Error::BuildInProgress { fingerprint: running.to_string() });
        }
        let snapshot = self.publish(CorpusSnapshot::idle());
        self.builder.cache().clear();
        info!("corpus cleaned up");
        Ok(snapshot)
    }

    /// Remove sources by path or display name and rerun the full
    /// reuse-or-rebuild rule on what remains. Removing everything cleans up.
    pub fn remove_sources(&self, paths: &[String]) -> Result<Arc<CorpusSnapshot>> {
        let current = self.status();
        let remaining: Vec<DocumentDescriptor> = current
            .documents
            .iter()
            .filter(|d| !paths.iter().any(|p| *p == d.path || *p == display_source(&d.path)))
            .cloned()
            .collect();
        info!(removed = current.documents.len() - remaining.len(), remaining = remaining.len(), "removing sources");
        if remaining.is_empty() {
            return self.cleanup();
        }
        self.build_or_reuse_index(&remaining)
    }

    /// Run the retrieval cascade against the published index.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<Retrieved> {
        if request.query.trim().is_empty() {
            return Err(Error::Retrieval("query must not be empty".into()));
        }
        let snapshot = self.status();
        let index = match (snapshot.status, snapshot.index()) {
            (CorpusStatus::Ready, Some(index)) => Arc::clone(index),
            (CorpusStatus::Processing, _) => {
                return Err(Error::Retrieval("documents are still being processed; try again shortly".into()));
            }
            (CorpusStatus::Error, _) => {
                let detail = snapshot.error.as_deref().unwrap_or("unknown error");
                return Err(Error::Retrieval(format!("document processing failed: {detail}")));
            }
            _ => {
                return Err(Error::Retrieval("no documents loaded; load documents before querying".into()));
            }
        };
        let config = self.cascade.with_overrides(&request.overrides);
        Retriever::new(index.as_ref(), self.reranker.as_ref(), self.builder.embedder().as_ref())
            .retrieve(&request.query, &config)
    }
}
