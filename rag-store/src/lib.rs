//! Per-chat retrieval-augmented Q&A store.
//!
//! [`RagStore`] is the single entry point for application code:
//! - `process_document` extracts, chunks, embeds and indexes an uploaded file
//!   into the chat's index;
//! - `query` answers a question from the chat's chunks and recent history;
//! - `reset` / `status` manage and inspect the base index and chat histories.
//!
//! Indexes live behind the [`SearchBackend`] trait (Qdrant in production, an
//! in-memory map for tests); models live behind [`Embedder`] and [`ChatModel`].

pub mod backend;
pub mod chat_state;
pub mod chunker;
pub mod config;
pub mod errors;
mod ingest;
pub mod models;
pub mod naming;
pub mod prompt;
pub mod record;
mod retrieve;
pub mod router;
pub mod schema;

use std::sync::Arc;

use ai_llm_service::{HealthStatus, LlmServiceProfiles};
use tracing::{debug, info, warn};

pub use backend::{SearchBackend, memory::MemoryBackend, qdrant::QdrantBackend};
pub use config::{BackendKind, DriftPolicy, QdrantSettings, RagConfig};
pub use errors::{RagError, RagResult};
pub use models::{ChatModel, DocExtractor, Embedder, TextExtractor};
pub use record::{HistoryEntry, IngestOutcome, QueryOutcome, ResetOutcome, SourceRef, StatusOutcome};
pub use retrieve::{NOT_FOUND_ANSWER, make_source_ref};

use backend::{FieldFilter, SearchRequest};
use chat_state::ChatStateStore;
use chunker::TextSplitter;
use record::fields;
use router::IndexRouter;
use schema::SchemaManager;

/// Text embedded at startup to learn the model's vector length.
const DIMENSION_PROBE: &str = "dimension probe";

/// Facade wiring configuration, search backend, models and chat state.
///
/// Construct once and share behind an `Arc`.
pub struct RagStore {
    cfg: RagConfig,
    backend: Arc<dyn SearchBackend>,
    router: IndexRouter,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    extractor: Arc<dyn TextExtractor>,
    state: ChatStateStore,
    llm: Option<Arc<LlmServiceProfiles>>,
    vector_dimensions: usize,
}

impl RagStore {
    /// Builds a store and ensures the base index exists.
    ///
    /// When `cfg.vector_dimensions` is unset the embedder is probed once.
    ///
    /// # Errors
    /// Invalid configuration, an empty probe vector, or a backend failure
    /// while ensuring the base index.
    pub async fn new(
        cfg: RagConfig,
        backend: Arc<dyn SearchBackend>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> RagResult<Self> {
        cfg.validate()?;
        let splitter = TextSplitter::new(cfg.chunk_size, cfg.chunk_overlap)?;

        let vector_dimensions = match cfg.vector_dimensions {
            Some(d) => d,
            None => {
                let probe = embedder.embed_one(DIMENSION_PROBE).await?;
                if probe.is_empty() {
                    return Err(RagError::Config(
                        "embedding model returned an empty vector; set VECTOR_DIMENSIONS".into(),
                    ));
                }
                info!(dims = probe.len(), "detected embedding dimensions");
                probe.len()
            }
        };

        let schema = SchemaManager::new(Arc::clone(&backend), cfg.drift_policy);
        let router = IndexRouter::new(
            Arc::clone(&backend),
            schema,
            cfg.index_prefix.clone(),
            vector_dimensions,
        );
        router.client_for_index(&cfg.base_index).await?;
        info!(
            base_index = %cfg.base_index,
            dims = vector_dimensions,
            backend = ?cfg.backend,
            "rag store ready"
        );

        Ok(Self {
            cfg,
            backend,
            router,
            splitter,
            embedder,
            chat,
            extractor: Arc::new(DocExtractor),
            state: ChatStateStore::new(),
            llm: None,
            vector_dimensions,
        })
    }

    /// Builds the backend and LLM profiles from the environment.
    pub async fn from_env() -> RagResult<Self> {
        let cfg = RagConfig::from_env()?;
        let backend: Arc<dyn SearchBackend> = match cfg.backend {
            BackendKind::Qdrant => Arc::new(QdrantBackend::new(&cfg.qdrant, cfg.list_page_size)?),
            BackendKind::Memory => {
                warn!("using in-memory search backend; indexed documents are not persisted");
                Arc::new(MemoryBackend::new())
            }
        };
        let llm = Arc::new(LlmServiceProfiles::from_env()?);
        let store = Self::new(cfg, backend, llm.clone(), llm.clone()).await?;
        Ok(store.with_llm_profiles(llm))
    }

    /// Replaces the document text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Keeps the LLM profiles around for health reporting.
    pub fn with_llm_profiles(mut self, llm: Arc<LlmServiceProfiles>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Vector length every index is created with.
    pub fn vector_dimensions(&self) -> usize {
        self.vector_dimensions
    }

    /// Health of the chat and embedding providers; empty without LLM profiles.
    pub async fn llm_health(&self) -> Vec<HealthStatus> {
        match &self.llm {
            Some(llm) => llm.health_all().await,
            None => Vec::new(),
        }
    }

    /// Clears history and indexed chunks for one chat, or for everything.
    ///
    /// Only the base index is cleaned; per-chat indexes keep their chunks.
    pub async fn reset(&self, chat_id: Option<&str>) -> RagResult<ResetOutcome> {
        let chat_id = chat_id.filter(|id| !id.trim().is_empty());
        match chat_id {
            Some(id) => {
                self.state.forget(id).await;
            }
            None => self.state.clear().await,
        }

        let filter = chat_id.map(|id| FieldFilter::eq(fields::CHAT_ID, id));
        let deleted = self.delete_matching(filter).await?;

        let message = match chat_id {
            Some(id) => format!("Chat {id} reset. Removed {deleted} indexed chunks."),
            None => format!("System reset. Removed {deleted} indexed chunks across all chats."),
        };
        info!(chat_id = chat_id.unwrap_or("*"), deleted, "reset complete");
        Ok(ResetOutcome {
            success: true,
            message,
            deleted,
        })
    }

    /// Whether the base index holds any chunk (for the chat, when given).
    pub async fn status(&self, chat_id: Option<&str>) -> StatusOutcome {
        let chat_id = chat_id.filter(|id| !id.trim().is_empty());
        let request = SearchRequest {
            filter: chat_id.map(|id| FieldFilter::eq(fields::CHAT_ID, id)),
            select: vec![fields::ID.to_string()],
            top: Some(1),
            ..SearchRequest::default()
        };
        let has_documents = match self.backend.search(&self.cfg.base_index, &request).await {
            Ok(docs) => !docs.is_empty(),
            Err(e) => {
                warn!(error = %e, "status lookup failed");
                false
            }
        };
        let message = match chat_id {
            Some(id) => format!("Ready to answer questions for chat '{id}'."),
            None => "Ready to answer questions for the system.".to_string(),
        };
        StatusOutcome {
            has_documents,
            ready: true,
            message,
        }
    }

    /// Lists matching ids in the base index and deletes them in batches.
    async fn delete_matching(&self, filter: Option<FieldFilter>) -> RagResult<usize> {
        if let Some(f) = &filter {
            debug!(filter = %f.expression(), "listing documents to delete");
        }
        let request = SearchRequest {
            filter,
            select: vec![fields::ID.to_string()],
            ..SearchRequest::default()
        };
        let docs = self.backend.search(&self.cfg.base_index, &request).await?;
        let ids: Vec<String> = docs
            .iter()
            .filter_map(|d| d.get(fields::ID).and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();

        let mut deleted = 0;
        let mut start = 0;
        while start < ids.len() {
            let end = (start + self.cfg.delete_batch_size).min(ids.len());
            deleted += self
                .backend
                .delete_documents(&self.cfg.base_index, &ids[start..end])
                .await?;
            debug!(batch = end - start, deleted, "deleted batch");
            start = end;
        }
        Ok(deleted)
    }
}
