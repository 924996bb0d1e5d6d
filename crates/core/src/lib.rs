pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod query;
pub mod selector;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, normalize_lines, DEFAULT_CHUNK_SIZE};
pub use config::{EmbeddingProvider, Settings};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingGateway, OllamaEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ChunkError, ConfigError, EmbeddingError, ExtractionError, IngestError, LlmError, QueryError,
    StoreError,
};
pub use extractor::{LopdfExtractor, TextExtractor};
pub use ingest::{discover_pdf_files, is_pdf_path, IngestionPipeline};
pub use llm::{LlmGateway, OllamaClient};
pub use models::{
    Answer, BackendKind, DocumentId, IngestOutcome, IngestReport, RetrievedChunk, Score,
};
pub use query::{QueryPipeline, TOP_K};
pub use selector::{select_embedder, select_store};
pub use stores::{FlatIndex, LocalStoreProvider, QdrantClient, QdrantStoreProvider};
pub use traits::{DocumentStore, IngestSlot, StoreProvider};
