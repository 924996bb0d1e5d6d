//! Typed settings, read once at start-up and handed to every component that needs them.

use crate::chunking::DEFAULT_CHUNK_SIZE;
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::models::BackendKind;
use crate::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub backend: BackendKind,
    pub embed_dim: usize,
    pub chunk_size: usize,
    pub vector_store_root: PathBuf,
    pub qdrant: QdrantSettings,
    pub ollama: OllamaSettings,
    pub embedding: EmbeddingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            embed_dim: DEFAULT_EMBEDDING_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            vector_store_root: PathBuf::from("vector_store_data"),
            qdrant: QdrantSettings::default(),
            ollama: OllamaSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

/// Connection parameters for Qdrant. Host and port have no defaults: they are
/// required whenever the qdrant backend is selected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QdrantSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: u64,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            timeout_secs: 30,
        }
    }
}

impl QdrantSettings {
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        let host = self
            .host
            .as_deref()
            .filter(|host| !host.trim().is_empty())
            .ok_or(ConfigError::Missing("qdrant.host"))?;
        let port = self.port.ok_or(ConfigError::Missing("qdrant.port"))?;
        http_endpoint(host, port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaSettings {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            model: "llama3".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OllamaSettings {
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        http_endpoint(&self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Ngram,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Model name passed to Ollama's embed endpoint.
    pub model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ngram,
            model: "all-minilm".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embed_dim == 0 {
            return Err(ConfigError::Invalid("embed_dim must be positive".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.backend == BackendKind::Qdrant {
            self.qdrant.endpoint()?;
        }
        self.ollama.endpoint()?;
        Ok(())
    }
}

fn http_endpoint(host: &str, port: u16) -> Result<String, ConfigError> {
    let url = Url::parse(&format!("http://{}:{}", host.trim(), port))
        .map_err(|error| ConfigError::Invalid(format!("{host}:{port}: {error}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}
