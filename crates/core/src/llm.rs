use crate::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering based on the context.";

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, context: &str, question: &str) -> Result<String, LlmError>;
}

/// Non-streaming client for Ollama's `/api/chat` endpoint.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let endpoint: String = endpoint.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::Transport)?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl LlmGateway for OllamaClient {
    async fn complete(&self, context: &str, question: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&chat_request(&self.model, context, question))
            .send()
            .await
            .map_err(|error| LlmError::from_transport(&self.endpoint, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|error| LlmError::from_transport(&self.endpoint, error))?;
        let answer = parse_chat_reply(&parsed)?;

        debug!(model = %self.model, chars = answer.len(), "llm answered");
        Ok(answer)
    }
}

fn chat_request(model: &str, context: &str, question: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": format!("Context:\n{context}\n\nQuestion:\n{question}")},
        ],
        "stream": false,
    })
}

fn parse_chat_reply(parsed: &Value) -> Result<String, LlmError> {
    parsed
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::MalformedResponse(format!("no message content in {parsed}")))
}
