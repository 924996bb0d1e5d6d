use crate::models::{BackendKind, DocumentId, RetrievedChunk};
use crate::StoreError;
use async_trait::async_trait;

/// One document's vectors and chunk texts, whichever backend holds them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends vectors and their chunk texts in matching order.
    async fn add(&mut self, vectors: &[Vec<f32>], chunks: &[String]) -> Result<(), StoreError>;

    /// Up to `k` chunks, best first, under the backend's own score semantics.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Makes everything added so far durable.
    async fn persist(&mut self) -> Result<(), StoreError>;

    /// Whether freshly inserted data can be found again with `probe`.
    async fn verify(&self, probe: &[f32]) -> Result<bool, StoreError> {
        Ok(!self.search(probe, 1).await?.is_empty())
    }
}

pub enum IngestSlot {
    AlreadyIngested,
    Fresh(Box<dyn DocumentStore>),
}

/// Resolves document identities to stores, hiding backend lifecycle details.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Returns an empty store for `id` unless the document is already ingested.
    async fn begin_ingest(&self, id: &DocumentId) -> Result<IngestSlot, StoreError>;

    /// Opens an existing store for reading; `None` when nothing is stored for `id`.
    async fn open(&self, id: &DocumentId) -> Result<Option<Box<dyn DocumentStore>>, StoreError>;

    /// Removes everything stored for `id`. Returns whether anything existed.
    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError>;
}
