use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content address of a document: lowercase hex SHA-256 of its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accepts only the 64-character lowercase hex form produced by [`DocumentId::from_bytes`].
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let valid = value.len() == 64
            && value
                .bytes()
                .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));

        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Relevance reported by a backend. The two variants rank in opposite directions
/// and are intentionally not comparable with each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Squared Euclidean distance; lower is better.
    Distance(f32),
    /// Cosine similarity; higher is better.
    Similarity(f32),
}

impl Score {
    pub fn value(&self) -> f32 {
        match self {
            Score::Distance(value) | Score::Similarity(value) => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created { chunks: usize },
    AlreadyIngested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub context: Vec<RetrievedChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_share_an_identity() {
        let first = DocumentId::from_bytes(b"%PDF-1.4 same bytes");
        let second = DocumentId::from_bytes(b"%PDF-1.4 same bytes");
        let other = DocumentId::from_bytes(b"%PDF-1.4 other bytes");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn parse_accepts_only_hex_digests() {
        let id = DocumentId::from_bytes(b"abc");
        assert_eq!(DocumentId::parse(id.as_str()), Some(id.clone()));
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        assert!(DocumentId::parse("../../etc/passwd").is_none());
        assert!(DocumentId::parse(&id.as_str().to_uppercase()).is_none());
        assert!(DocumentId::parse(&id.as_str()[..63]).is_none());
    }

    #[test]
    fn score_serializes_with_its_kind() {
        let value = serde_json::to_value(Score::Distance(0.5)).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "distance", "value": 0.5}));
    }
}
