//! Runtime configuration for indexing and retrieval, read from the environment.

use crate::errors::RagError;

/// Which search backend the store talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Qdrant over gRPC.
    Qdrant,
    /// Process-local store; contents vanish on restart.
    Memory,
}

/// What `ensure_index` does when an existing index no longer matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftPolicy {
    /// Drop and recreate the index; every chunk in it is lost.
    Recreate,
    /// Leave the index alone and return `RagError::SchemaDrift`.
    Fail,
}

/// Qdrant connectivity.
#[derive(Clone, Debug)]
pub struct QdrantSettings {
    /// gRPC URL, e.g. `http://localhost:6334`.
    pub url: String,
    /// Optional API key for Qdrant Cloud.
    pub api_key: Option<String>,
}

/// Configuration for the per-chat RAG store.
#[derive(Clone, Debug)]
pub struct RagConfig {
    pub backend: BackendKind,
    pub qdrant: QdrantSettings,
    /// Index created at startup; reset and status operate on it.
    pub base_index: String,
    /// Prefix joined to sanitized chat keys.
    pub index_prefix: String,
    /// Fixed embedding dimensionality; probed from the model when `None`.
    pub vector_dimensions: Option<usize>,
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Nearest neighbours fetched per query.
    pub top_k: usize,
    /// History entries rendered into a prompt.
    pub history_window: usize,
    /// Max ids per delete request during reset.
    pub delete_batch_size: usize,
    /// Page size used when listing documents without a vector.
    pub list_page_size: usize,
    pub drift_policy: DriftPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Qdrant,
            qdrant: QdrantSettings {
                url: "http://localhost:6334".to_string(),
                api_key: None,
            },
            base_index: "rag-index".to_string(),
            index_prefix: "rag-".to_string(),
            vector_dimensions: None,
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            history_window: 3,
            delete_batch_size: 1000,
            list_page_size: 1000,
            drift_policy: DriftPolicy::Recreate,
        }
    }
}

impl RagConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `SEARCH_BACKEND` (`qdrant` | `memory`; default: `qdrant`)
    /// - `QDRANT_URL` (default: `http://localhost:6334`), `QDRANT_API_KEY`
    /// - `RAG_BASE_INDEX` (default: `rag-index`)
    /// - `RAG_INDEX_PREFIX` (default: `rag-`)
    /// - `VECTOR_DIMENSIONS` (optional)
    /// - `CHUNK_SIZE` (default: 1000), `CHUNK_OVERLAP` (default: 200)
    /// - `RAG_TOP_K` (default: 3), `RAG_HISTORY_WINDOW` (default: 3)
    /// - `RAG_DELETE_BATCH_SIZE` (default: 1000), `RAG_LIST_PAGE_SIZE` (default: 1000)
    /// - `RAG_SCHEMA_DRIFT_POLICY` (`recreate` | `fail`; default: `recreate`)
    pub fn from_env() -> Result<Self, RagError> {
        let d = Self::default();

        let backend = match read_string_env("SEARCH_BACKEND").as_deref() {
            None | Some("qdrant") => BackendKind::Qdrant,
            Some("memory") => BackendKind::Memory,
            Some(other) => {
                return Err(RagError::Config(format!(
                    "SEARCH_BACKEND must be 'qdrant' or 'memory', got '{other}'"
                )));
            }
        };

        let drift_policy = match read_string_env("RAG_SCHEMA_DRIFT_POLICY").as_deref() {
            None | Some("recreate") => DriftPolicy::Recreate,
            Some("fail") => DriftPolicy::Fail,
            Some(other) => {
                return Err(RagError::Config(format!(
                    "RAG_SCHEMA_DRIFT_POLICY must be 'recreate' or 'fail', got '{other}'"
                )));
            }
        };

        let cfg = Self {
            backend,
            qdrant: QdrantSettings {
                url: read_string_env("QDRANT_URL").unwrap_or(d.qdrant.url),
                api_key: read_string_env("QDRANT_API_KEY"),
            },
            base_index: read_string_env("RAG_BASE_INDEX").unwrap_or(d.base_index),
            index_prefix: read_string_env("RAG_INDEX_PREFIX").unwrap_or(d.index_prefix),
            vector_dimensions: read_usize_env("VECTOR_DIMENSIONS")?,
            chunk_size: read_usize_env("CHUNK_SIZE")?.unwrap_or(d.chunk_size),
            chunk_overlap: read_usize_env("CHUNK_OVERLAP")?.unwrap_or(d.chunk_overlap),
            top_k: read_usize_env("RAG_TOP_K")?.unwrap_or(d.top_k),
            history_window: read_usize_env("RAG_HISTORY_WINDOW")?.unwrap_or(d.history_window),
            delete_batch_size: read_usize_env("RAG_DELETE_BATCH_SIZE")?
                .unwrap_or(d.delete_batch_size),
            list_page_size: read_usize_env("RAG_LIST_PAGE_SIZE")?.unwrap_or(d.list_page_size),
            drift_policy,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.base_index.trim().is_empty() {
            return Err(RagError::Config("base index name is empty".into()));
        }
        if self.backend == BackendKind::Qdrant && self.qdrant.url.trim().is_empty() {
            return Err(RagError::Config("QDRANT_URL is empty".into()));
        }
        if self.vector_dimensions == Some(0) {
            return Err(RagError::Config("VECTOR_DIMENSIONS must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Config("CHUNK_SIZE must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("RAG_TOP_K must be > 0".into()));
        }
        if self.delete_batch_size == 0 || self.list_page_size == 0 {
            return Err(RagError::Config(
                "RAG_DELETE_BATCH_SIZE and RAG_LIST_PAGE_SIZE must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn read_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read an optional `usize` from env; unset or empty yields `None`.
fn read_usize_env(key: &str) -> Result<Option<usize>, RagError> {
    match read_string_env(key) {
        Some(v) => v.parse::<usize>().map(Some).map_err(|_| RagError::EnvParse {
            key: key.into(),
            value: v,
        }),
        None => Ok(None),
    }
}
