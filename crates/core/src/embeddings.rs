use crate::error::{BoxError, EmbeddingError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Dimension of the default sentence embedding model (all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BoxError>;
}

/// Deterministic hashed character-trigram embedder. Needs no model download.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        // Texts shorter than a trigram hash as a single token.
        let window = chars.len().min(3);
        for gram in chars.windows(window) {
            let mut hash = 1469598103934665603u64;
            for ch in gram {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BoxError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Embedder backed by an Ollama server's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| EmbeddingError::with_source("cannot build http client", error))?;

        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            dimensions,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BoxError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("embedding server returned {status}: {body}").into());
        }

        let parsed: Value = response.json().await?;
        parse_embeddings(&parsed)
    }
}

fn parse_embeddings(parsed: &Value) -> Result<Vec<Vec<f32>>, BoxError> {
    let rows = parsed
        .pointer("/embeddings")
        .and_then(Value::as_array)
        .ok_or("response has no `embeddings` array")?;

    rows.iter()
        .map(|row| -> Result<Vec<f32>, BoxError> {
            row.as_array()
                .ok_or("embedding row is not an array")?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .map(|value| value as f32)
                        .ok_or_else(|| BoxError::from("embedding value is not a number"))
                })
                .collect()
        })
        .collect()
}

fn normalize(vector: &mut [f32]) -> f32 {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 && magnitude.is_finite() {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
    magnitude
}

/// Front door to an [`Embedder`] that guarantees one unit-length vector of the
/// configured dimension per input text, in input order, or an error.
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    dimensions: usize,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, dimensions: usize) -> Result<Self, EmbeddingError> {
        if embedder.dimensions() != dimensions {
            return Err(EmbeddingError::new(format!(
                "embedder produces {} dimensions, configured {}",
                embedder.dimensions(),
                dimensions
            )));
        }
        Ok(Self {
            embedder,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn embed(&self, chunks: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self
            .embedder
            .encode(chunks)
            .await
            .map_err(|error| EmbeddingError::with_source("failed to embed chunks", error))?;

        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::new(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                chunks.len()
            )));
        }

        for (position, vector) in vectors.iter_mut().enumerate() {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::new(format!(
                    "vector {position} has dimension {}, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
            let magnitude = normalize(vector);
            if magnitude == 0.0 || !magnitude.is_finite() {
                return Err(EmbeddingError::new(format!(
                    "vector {position} cannot be normalized (norm {magnitude})"
                )));
            }
        }

        debug!(count = vectors.len(), dimensions = self.dimensions, "embedded batch");
        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::new("embedder returned no vector"))
    }
}
