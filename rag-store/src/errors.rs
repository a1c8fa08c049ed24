//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    // ── Configuration / environment ──────────────────────────────────────────
    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Environment variable present but not parseable.
    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    // ── Search backend ──────────────────────────────────────────────────────
    /// Search/index backend failure (wrapped).
    #[error("search backend error: {0}")]
    Backend(String),

    /// Existing index schema diverged and the policy forbids repair.
    #[error("index '{index}' schema drift ({reason}); recreate it or set RAG_SCHEMA_DRIFT_POLICY=recreate")]
    SchemaDrift { index: String, reason: String },

    /// Embedding length differs from the index dimensionality.
    #[error(
        "Embedding dimension mismatch: index '{index}' expects {expected} but embedding model returned {got}. \
         Set VECTOR_DIMENSIONS to the correct value or recreate the index."
    )]
    DimensionMismatch {
        index: String,
        expected: usize,
        got: usize,
    },

    // ── Models ──────────────────────────────────────────────────────────────
    /// LLM / embedding provider failure.
    #[error(transparent)]
    Llm(#[from] ai_llm_service::AiLlmError),

    /// Embedding output unusable (empty, wrong count).
    #[error("embedding error: {0}")]
    Embedding(String),

    // ── Documents ───────────────────────────────────────────────────────────
    /// Text extraction failed.
    #[error(transparent)]
    Extract(#[from] doc_extract::ExtractError),

    /// Blocking task panicked or was cancelled.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::Backend(err.to_string())
    }
}

/// Result alias used across the crate.
pub type RagResult<T> = Result<T, RagError>;
