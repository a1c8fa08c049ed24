//! Core data models: stored chunks, chat history and operation outcomes.

use serde::{Deserialize, Serialize};

/// Field names of the document schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const CHAT_ID: &str = "chat_id";
    pub const CONTENT: &str = "content";
    pub const CONTENT_VECTOR: &str = "content_vector";
    pub const SOURCE: &str = "source";
}

/// One indexed chunk of an uploaded document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Deterministic key: sanitized `{chat_id}_{filename}` plus chunk ordinal.
    pub id: String,
    pub content: String,
    pub content_vector: Vec<f32>,
    /// Original filename the chunk came from.
    pub source: String,
    pub chat_id: String,
}

/// A completed question/answer turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
}

/// Result of `process_document`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
    pub chunks: usize,
}

impl IngestOutcome {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            chunks: 0,
        }
    }
}

/// A retrieved chunk as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// First 200 characters of the chunk followed by `...`.
    pub content: String,
    pub source: String,
}

/// Result of `query`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl QueryOutcome {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: message.into(),
            sources: Vec::new(),
        }
    }
}

/// Result of `reset`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub success: bool,
    pub message: String,
    /// Number of indexed chunks removed.
    pub deleted: usize,
}

/// Result of `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOutcome {
    pub has_documents: bool,
    pub ready: bool,
    pub message: String,
}
