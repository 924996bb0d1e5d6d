use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("document produced no text chunks")]
    EmptyInput,

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdf parse error: {0}")]
    Parse(String),
}

/// Any failure of the embedding backend, including a malformed reply.
#[derive(Debug, Error)]
#[error("embedding failed: {message}")]
pub struct EmbeddingError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl EmbeddingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("corrupt index at {path}: {details}")]
    CorruptIndex { path: PathBuf, details: String },

    #[error("vector count {vectors} doesn't match chunk count {chunks}")]
    LengthMismatch { vectors: usize, chunks: usize },

    #[error("vector dimension {actual} is not {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store already persisted at {0}")]
    AlreadyPersisted(PathBuf),

    #[error("store was opened read-only")]
    ReadOnly,

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("cannot connect to LLM server at {endpoint}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to LLM server timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("LLM HTTP error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("unexpected error when querying LLM: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    pub(crate) fn from_transport(endpoint: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else if error.is_connect() {
            Self::Connection {
                endpoint: endpoint.to_string(),
                source: error,
            }
        } else {
            Self::Transport(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("no text found in the PDF file")]
    EmptyInput,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(usize),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to verify inserted data for document {document_id}")]
    Verification { document_id: String },
}

impl From<ChunkError> for IngestError {
    fn from(value: ChunkError) -> Self {
        match value {
            ChunkError::EmptyInput => Self::EmptyInput,
            ChunkError::InvalidChunkSize(size) => Self::InvalidChunkConfig(size),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("question cannot be empty")]
    InvalidQuery,

    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("document vector store not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no relevant context found")]
    NoContext,

    #[error(transparent)]
    Llm(#[from] LlmError),
}
