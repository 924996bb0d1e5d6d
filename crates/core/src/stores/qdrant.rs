use crate::models::{BackendKind, DocumentId, RetrievedChunk, Score};
use crate::traits::{DocumentStore, IngestSlot, StoreProvider};
use crate::StoreError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Thin client over Qdrant's REST API. One collection per document.
#[derive(Clone)]
pub struct QdrantClient {
    endpoint: String,
    client: Client,
}

impl QdrantClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let endpoint: String = endpoint.into();
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.endpoint, name)
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self.client.get(self.collection_url(name)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(backend_error(response).await),
        }
    }

    /// Creates a cosine collection of `dimension` unless one already exists.
    ///
    /// A create that fails because a concurrent request created the collection
    /// first still counts as success.
    pub async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), StoreError> {
        if self.collection_exists(name).await? {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url(name))
            .json(&json!({
                "vectors": {
                    "size": dimension,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if response.status().is_success() {
            info!(collection = name, dimension, "created qdrant collection");
            return Ok(());
        }

        let error = backend_error(response).await;
        if self.collection_exists(name).await? {
            debug!(collection = name, "collection created concurrently");
            return Ok(());
        }
        Err(error)
    }

    pub async fn exists_and_nonempty(&self, name: &str) -> Result<bool, StoreError> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }

        let response = self
            .client
            .post(format!("{}/points/scroll", self.collection_url(name)))
            .json(&json!({
                "limit": 1,
                "with_payload": false,
                "with_vector": false,
            }))
            .send()
            .await?;
        let parsed = success_json(response).await?;

        Ok(parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .is_some_and(|points| !points.is_empty()))
    }

    pub async fn upsert(
        &self,
        name: &str,
        vectors: &[Vec<f32>],
        chunks: &[String],
    ) -> Result<(), StoreError> {
        if vectors.len() != chunks.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(());
        }

        let points = vectors
            .iter()
            .zip(chunks)
            .map(|(vector, chunk)| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": vector,
                    "payload": { "text": chunk },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(name)))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        success_json(response).await?;

        debug!(collection = name, points = vectors.len(), "upserted points");
        Ok(())
    }

    pub async fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url(name)))
            .json(&json!({
                "vector": query,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;
        let parsed = success_json(response).await?;

        parse_search_hits(&parsed)
    }

    /// Drops the collection and every point in it. Returns whether it existed.
    pub async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }

        let response = self.client.delete(self.collection_url(name)).send().await?;
        success_json(response).await?;
        info!(collection = name, "deleted qdrant collection");
        Ok(true)
    }
}

async fn backend_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    }
}

async fn success_json(response: Response) -> Result<Value, StoreError> {
    if !response.status().is_success() {
        return Err(backend_error(response).await);
    }
    Ok(response.json().await?)
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<RetrievedChunk>, StoreError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "search response has no result array".to_string(),
        })?;

    hits.iter()
        .map(|hit| -> Result<RetrievedChunk, StoreError> {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::BackendResponse {
                    backend: BACKEND.to_string(),
                    details: format!("hit without text payload: {hit}"),
                })?;
            let score = hit
                .pointer("/score")
                .and_then(Value::as_f64)
                .ok_or_else(|| StoreError::BackendResponse {
                    backend: BACKEND.to_string(),
                    details: format!("hit without score: {hit}"),
                })?;

            Ok(RetrievedChunk {
                text: text.to_string(),
                score: Score::Similarity(score as f32),
            })
        })
        .collect()
}

pub struct QdrantStoreProvider {
    client: QdrantClient,
    dimension: usize,
}

impl QdrantStoreProvider {
    pub fn new(client: QdrantClient, dimension: usize) -> Self {
        Self { client, dimension }
    }

    pub fn client(&self) -> &QdrantClient {
        &self.client
    }

    fn collection(&self, id: &DocumentId) -> QdrantCollection {
        QdrantCollection {
            client: self.client.clone(),
            name: id.as_str().to_string(),
            dimension: self.dimension,
            ensured: false,
        }
    }
}

#[async_trait]
impl StoreProvider for QdrantStoreProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::Qdrant
    }

    async fn begin_ingest(&self, id: &DocumentId) -> Result<IngestSlot, StoreError> {
        // An existing but empty collection is a failed earlier attempt: ingest again.
        if self.client.exists_and_nonempty(id.as_str()).await? {
            debug!(document_id = %id, "collection already populated");
            return Ok(IngestSlot::AlreadyIngested);
        }
        Ok(IngestSlot::Fresh(Box::new(self.collection(id))))
    }

    async fn open(&self, id: &DocumentId) -> Result<Option<Box<dyn DocumentStore>>, StoreError> {
        if !self.client.collection_exists(id.as_str()).await? {
            return Ok(None);
        }
        let mut collection = self.collection(id);
        collection.ensured = true;
        Ok(Some(Box::new(collection)))
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        self.client.delete_collection(id.as_str()).await
    }
}

/// Handle on one document's collection. The collection itself is only created by
/// the first `add`, so an ingestion that fails earlier leaves nothing behind.
struct QdrantCollection {
    client: QdrantClient,
    name: String,
    dimension: usize,
    ensured: bool,
}

#[async_trait]
impl DocumentStore for QdrantCollection {
    async fn add(&mut self, vectors: &[Vec<f32>], chunks: &[String]) -> Result<(), StoreError> {
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        if !self.ensured {
            self.client.ensure_collection(&self.name, self.dimension).await?;
            self.ensured = true;
        }
        self.client.upsert(&self.name, vectors, chunks).await
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        self.client.search(&self.name, query, k).await
    }

    async fn persist(&mut self) -> Result<(), StoreError> {
        // Upserts are sent with `wait=true`; nothing is buffered client-side.
        Ok(())
    }
}
