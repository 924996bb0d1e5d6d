use crate::chunking::chunk_text;
use crate::embeddings::EmbeddingGateway;
use crate::extractor::TextExtractor;
use crate::models::{DocumentId, IngestOutcome, IngestReport};
use crate::traits::{IngestSlot, StoreProvider};
use crate::IngestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Recursively lists `.pdf` files under `folder`, sorted.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if is_pdf_path(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Turns raw PDF bytes into a persisted, searchable index keyed by content hash.
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    embeddings: EmbeddingGateway,
    stores: Arc<dyn StoreProvider>,
    chunk_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embeddings: EmbeddingGateway,
        stores: Arc<dyn StoreProvider>,
        chunk_size: usize,
    ) -> Self {
        Self {
            extractor,
            embeddings,
            stores,
            chunk_size,
        }
    }

    pub async fn ingest(&self, raw_bytes: &[u8]) -> Result<IngestReport, IngestError> {
        let document_id = DocumentId::from_bytes(raw_bytes);

        let mut store = match self.stores.begin_ingest(&document_id).await? {
            IngestSlot::AlreadyIngested => {
                info!(document_id = %document_id, "document already ingested");
                return Ok(IngestReport {
                    document_id,
                    outcome: IngestOutcome::AlreadyIngested,
                });
            }
            IngestSlot::Fresh(store) => store,
        };

        let text = self.extractor.extract(raw_bytes)?;
        let chunks = chunk_text(&text, self.chunk_size)?;
        let vectors = self.embeddings.embed(&chunks).await?;

        store.add(&vectors, &chunks).await?;
        store.persist().await?;

        if let Some(probe) = vectors.first() {
            if !store.verify(probe).await? {
                warn!(
                    document_id = %document_id,
                    backend = ?self.stores.backend(),
                    "inserted data is not searchable yet"
                );
                return Err(IngestError::Verification {
                    document_id: document_id.to_string(),
                });
            }
        }

        info!(
            document_id = %document_id,
            chunks = chunks.len(),
            backend = ?self.stores.backend(),
            "document ingested"
        );
        Ok(IngestReport {
            document_id,
            outcome: IngestOutcome::Created {
                chunks: chunks.len(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::error::{BoxError, ExtractionError};
    use crate::models::{BackendKind, RetrievedChunk};
    use crate::stores::LocalStoreProvider;
    use crate::traits::DocumentStore;
    use crate::StoreError;
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const DIM: usize = 32;

    /// Treats the input bytes as already-extracted UTF-8 text.
    struct PlainTextExtractor;

    impl TextExtractor for PlainTextExtractor {
        fn extract(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
            String::from_utf8(pdf_bytes.to_vec())
                .map_err(|error| ExtractionError::Parse(error.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            DIM
        }

        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CharacterNgramEmbedder { dimensions: DIM }.encode(texts).await
        }
    }

    /// Collection-style provider whose inserts are never visible to search.
    #[derive(Default)]
    struct LaggingRemote {
        inserted: Arc<AtomicUsize>,
        deleted: AtomicUsize,
    }

    struct LaggingCollection {
        inserted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DocumentStore for LaggingCollection {
        async fn add(&mut self, vectors: &[Vec<f32>], _chunks: &[String]) -> Result<(), StoreError> {
            self.inserted.fetch_add(vectors.len(), Ordering::SeqCst);
            Ok(())
        }

        async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
            Ok(Vec::new())
        }

        async fn persist(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[async_trait]
    impl StoreProvider for LaggingRemote {
        fn backend(&self) -> BackendKind {
            BackendKind::Qdrant
        }

        async fn begin_ingest(&self, _id: &DocumentId) -> Result<IngestSlot, StoreError> {
            Ok(IngestSlot::Fresh(Box::new(LaggingCollection {
                inserted: Arc::clone(&self.inserted),
            })))
        }

        async fn open(
            &self,
            _id: &DocumentId,
        ) -> Result<Option<Box<dyn DocumentStore>>, StoreError> {
            Ok(None)
        }

        async fn delete(&self, _id: &DocumentId) -> Result<bool, StoreError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn pipeline(
        embedder: Arc<CountingEmbedder>,
        stores: Arc<dyn StoreProvider>,
    ) -> IngestionPipeline {
        let gateway = EmbeddingGateway::new(embedder, DIM).unwrap();
        IngestionPipeline::new(Arc::new(PlainTextExtractor), gateway, stores, 20)
    }

    #[tokio::test]
    async fn ingestion_is_idempotent_for_identical_bytes() {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder::default());
        let stores = Arc::new(LocalStoreProvider::new(dir.path(), DIM));
        let pipeline = pipeline(Arc::clone(&embedder), stores.clone());
        let bytes = b"Alpha beta.\nGamma.\n\nDelta epsilon zeta.";

        let first = pipeline.ingest(bytes).await.unwrap();
        let second = pipeline.ingest(bytes).await.unwrap();

        assert_eq!(first.document_id, second.document_id);
        assert_eq!(first.outcome, IngestOutcome::Created { chunks: 2 });
        assert_eq!(second.outcome, IngestOutcome::AlreadyIngested);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let store = stores.open(&first.document_id).await.unwrap().expect("persisted");
        let hits = store.search(&vec![0.0; DIM], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn text_free_document_leaves_no_artifact() {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder::default());
        let stores = Arc::new(LocalStoreProvider::new(dir.path(), DIM));
        let pipeline = pipeline(Arc::clone(&embedder), stores);

        let error = pipeline.ingest(b" \n\n\t \n").await.unwrap_err();

        assert!(matches!(error, IngestError::EmptyInput));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let stores = Arc::new(LocalStoreProvider::new(dir.path(), DIM));
        let pipeline = pipeline(Arc::new(CountingEmbedder::default()), stores);

        let error = pipeline.ingest(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(error, IngestError::Extraction(_)));
    }

    #[tokio::test]
    async fn unverifiable_insert_fails_and_keeps_the_collection() {
        let remote = Arc::new(LaggingRemote::default());
        let pipeline = pipeline(Arc::new(CountingEmbedder::default()), remote.clone());
        let bytes = b"Some extracted text";

        let error = pipeline.ingest(bytes).await.unwrap_err();

        match error {
            IngestError::Verification { document_id } => {
                assert_eq!(document_id, DocumentId::from_bytes(bytes).to_string());
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
        assert_eq!(remote.inserted.load(Ordering::SeqCst), 1);
        assert_eq!(remote.deleted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_identical_uploads_produce_one_store() {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder::default());
        let stores = Arc::new(LocalStoreProvider::new(dir.path(), DIM));
        let pipeline = Arc::new(pipeline(Arc::clone(&embedder), stores));
        let bytes: &'static [u8] = b"Same file uploaded twice";

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.ingest(bytes).await }
        });
        let second = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.ingest(bytes).await }
        });

        let mut outcomes = vec![
            first.await.unwrap().unwrap().outcome,
            second.await.unwrap().unwrap().outcome,
        ];
        outcomes.sort_by_key(|outcome| matches!(outcome, IngestOutcome::AlreadyIngested));

        assert_eq!(
            outcomes,
            vec![IngestOutcome::Created { chunks: 1 }, IngestOutcome::AlreadyIngested]
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn pdf_extension_check_is_case_insensitive() {
        assert!(is_pdf_path(Path::new("report.PDF")));
        assert!(!is_pdf_path(Path::new("report.pdf.txt")));
        assert!(!is_pdf_path(Path::new("report")));
    }
}
