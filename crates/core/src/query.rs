use crate::embeddings::EmbeddingGateway;
use crate::llm::LlmGateway;
use crate::models::{Answer, DocumentId};
use crate::traits::StoreProvider;
use crate::QueryError;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of chunks retrieved as context for every question.
pub const TOP_K: usize = 5;

/// Answers a question against one document's index.
pub struct QueryPipeline {
    embeddings: EmbeddingGateway,
    stores: Arc<dyn StoreProvider>,
    llm: Arc<dyn LlmGateway>,
}

impl QueryPipeline {
    pub fn new(
        embeddings: EmbeddingGateway,
        stores: Arc<dyn StoreProvider>,
        llm: Arc<dyn LlmGateway>,
    ) -> Self {
        Self {
            embeddings,
            stores,
            llm,
        }
    }

    pub async fn query(&self, document_id: &str, question: &str) -> Result<Answer, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::InvalidQuery);
        }

        let id = DocumentId::parse(document_id)
            .ok_or_else(|| QueryError::InvalidDocumentId(document_id.to_string()))?;
        let store = self
            .stores
            .open(&id)
            .await?
            .ok_or_else(|| QueryError::NotFound(id.to_string()))?;

        let query_vector = self.embeddings.embed_one(question).await?;
        let context = store.search(&query_vector, TOP_K).await?;
        // Drop any read lock before calling the LLM.
        drop(store);

        if context.is_empty() {
            return Err(QueryError::NoContext);
        }
        debug!(document_id = %id, hits = context.len(), "retrieved context");

        let joined = context
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answer = self.llm.complete(&joined, question).await?;

        info!(document_id = %id, backend = ?self.stores.backend(), "question answered");
        Ok(Answer {
            question: question.to_string(),
            answer,
            context,
        })
    }
}
