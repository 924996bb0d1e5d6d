use super::flat::FlatIndex;
use crate::models::{BackendKind, DocumentId, RetrievedChunk};
use crate::traits::{DocumentStore, IngestSlot, StoreProvider};
use crate::StoreError;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};

/// Reader/writer locks keyed by document identity. Distinct identities never contend.
#[derive(Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl IdentityLocks {
    fn lock_for(&self, id: &DocumentId) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry(id.as_str().to_string())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }

    pub async fn read(&self, id: &DocumentId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(id).read_owned().await
    }

    pub async fn write(&self, id: &DocumentId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(id).write_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Flat indexes persisted as one directory per document under a root directory.
pub struct LocalStoreProvider {
    root: PathBuf,
    dimension: usize,
    locks: IdentityLocks,
}

impl LocalStoreProvider {
    pub fn new(root: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            root: root.into(),
            dimension,
            locks: IdentityLocks::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

#[async_trait]
impl StoreProvider for LocalStoreProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn begin_ingest(&self, id: &DocumentId) -> Result<IngestSlot, StoreError> {
        let guard = self.locks.write(id).await;
        let dir = self.path_for(id);

        if tokio::fs::try_exists(&dir).await? {
            debug!(document_id = %id, path = %dir.display(), "local store already present");
            return Ok(IngestSlot::AlreadyIngested);
        }

        Ok(IngestSlot::Fresh(Box::new(LocalDocumentStore {
            index: FlatIndex::new(self.dimension),
            dir,
            read_only: false,
            _guard: Box::new(guard),
        })))
    }

    async fn open(&self, id: &DocumentId) -> Result<Option<Box<dyn DocumentStore>>, StoreError> {
        let guard = self.locks.read(id).await;
        let dir = self.path_for(id);

        if !tokio::fs::try_exists(&dir).await? {
            return Ok(None);
        }

        let load_dir = dir.clone();
        let index = tokio::task::spawn_blocking(move || FlatIndex::load(&load_dir))
            .await
            .map_err(|error| StoreError::Task(error.to_string()))??;

        if index.dimension() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: index.dimension(),
            });
        }

        debug!(document_id = %id, vectors = index.len(), "loaded local index");
        Ok(Some(Box::new(LocalDocumentStore {
            index,
            dir,
            read_only: true,
            _guard: Box::new(guard),
        })))
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let _guard = self.locks.write(id).await;
        let dir = self.path_for(id);

        if !tokio::fs::try_exists(&dir).await? {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&dir).await?;
        info!(document_id = %id, "deleted local store");
        Ok(true)
    }
}

struct LocalDocumentStore {
    index: FlatIndex,
    dir: PathBuf,
    read_only: bool,
    /// Identity lock guard, read or write, released when the handle drops.
    _guard: Box<dyn Any + Send + Sync>,
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn add(&mut self, vectors: &[Vec<f32>], chunks: &[String]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.index.add(vectors, chunks)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
        self.index.search(query, k)
    }

    async fn persist(&mut self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let index = self.index.clone();
        let dir = self.dir.clone();
        let saved = tokio::task::spawn_blocking(move || index.save(&dir))
            .await
            .map_err(|error| StoreError::Task(error.to_string()))?;

        match saved {
            Ok(()) => {
                info!(path = %self.dir.display(), vectors = self.index.len(), "saved local index");
                Ok(())
            }
            Err(StoreError::AlreadyPersisted(path)) => {
                warn!(path = %path.display(), "another writer persisted this document first");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn verify(&self, _probe: &[f32]) -> Result<bool, StoreError> {
        Ok(true)
    }
}
