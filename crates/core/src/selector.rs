use crate::config::{EmbeddingProvider, Settings};
use crate::embeddings::{CharacterNgramEmbedder, Embedder, OllamaEmbedder};
use crate::models::BackendKind;
use crate::stores::{LocalStoreProvider, QdrantClient, QdrantStoreProvider};
use crate::traits::StoreProvider;
use crate::ConfigError;
use std::sync::Arc;
use tracing::info;

/// Builds the store provider named by `settings.backend`.
pub fn select_store(settings: &Settings) -> Result<Arc<dyn StoreProvider>, ConfigError> {
    if settings.embed_dim == 0 {
        return Err(ConfigError::Invalid("embed_dim must be positive".to_string()));
    }

    match settings.backend {
        BackendKind::Local => {
            info!(root = %settings.vector_store_root.display(), "using local flat index");
            Ok(Arc::new(LocalStoreProvider::new(
                settings.vector_store_root.clone(),
                settings.embed_dim,
            )))
        }
        BackendKind::Qdrant => {
            let endpoint = settings.qdrant.endpoint()?;
            let client = QdrantClient::new(&endpoint, settings.qdrant.timeout())
                .map_err(|error| ConfigError::Invalid(format!("qdrant client: {error}")))?;
            info!(endpoint = %endpoint, "using qdrant");
            Ok(Arc::new(QdrantStoreProvider::new(client, settings.embed_dim)))
        }
    }
}

/// Builds the process-wide embedder named by `settings.embedding.provider`.
pub fn select_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>, ConfigError> {
    match settings.embedding.provider {
        EmbeddingProvider::Ngram => Ok(Arc::new(CharacterNgramEmbedder {
            dimensions: settings.embed_dim,
        })),
        EmbeddingProvider::Ollama => {
            let embedder = OllamaEmbedder::new(
                settings.ollama.endpoint()?,
                settings.embedding.model.clone(),
                settings.embed_dim,
                settings.ollama.timeout(),
            )
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;
            Ok(Arc::new(embedder))
        }
    }
}
