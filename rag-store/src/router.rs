//! Chat-to-index routing with a per-index client cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::backend::{SearchBackend, SearchDocument, SearchRequest, UploadResult};
use crate::errors::RagResult;
use crate::naming::index_name_for;
use crate::record::ChunkRecord;
use crate::schema::SchemaManager;

/// Handle bound to one index whose schema has been ensured.
#[derive(Clone)]
pub struct SearchClient {
    backend: Arc<dyn SearchBackend>,
    index: String,
    dimensions: usize,
}

impl SearchClient {
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Vector length the index was ensured with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn upload(&self, records: Vec<ChunkRecord>) -> RagResult<Vec<UploadResult>> {
        self.backend.upload_documents(&self.index, records).await
    }

    pub async fn search(&self, request: &SearchRequest) -> RagResult<Vec<SearchDocument>> {
        self.backend.search(&self.index, request).await
    }
}

/// Key that selects a chat's index: its name when given, else its id.
pub fn route_key<'a>(chat_id: &'a str, chat_name: Option<&'a str>) -> &'a str {
    chat_name.filter(|n| !n.trim().is_empty()).unwrap_or(chat_id)
}

/// Resolves chats to search clients, ensuring each index at most once.
pub struct IndexRouter {
    backend: Arc<dyn SearchBackend>,
    schema: SchemaManager,
    prefix: String,
    dimensions: usize,
    // The map lock is held only to fetch the cell; initialisation awaits on the cell.
    clients: Mutex<HashMap<String, Arc<OnceCell<SearchClient>>>>,
}

impl IndexRouter {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        schema: SchemaManager,
        prefix: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            backend,
            schema,
            prefix: prefix.into(),
            dimensions,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Index name a chat routes to.
    pub fn index_name(&self, chat_id: &str, chat_name: Option<&str>) -> String {
        index_name_for(&self.prefix, route_key(chat_id, chat_name))
    }

    /// Client for the chat's index, creating or repairing the index on first use.
    pub async fn resolve_client(
        &self,
        chat_id: &str,
        chat_name: Option<&str>,
    ) -> RagResult<SearchClient> {
        let name = self.index_name(chat_id, chat_name);
        self.client_for_index(&name).await
    }

    /// Client for an already-named index (used for the base index).
    pub async fn client_for_index(&self, index_name: &str) -> RagResult<SearchClient> {
        let cell = {
            let mut clients = self.clients.lock().await;
            clients
                .entry(index_name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // A failed init leaves the cell empty, so the next caller retries.
        let client = cell
            .get_or_try_init(|| async {
                debug!(index = index_name, "initialising search client");
                self.schema.ensure_index(index_name, self.dimensions).await?;
                Ok::<_, crate::errors::RagError>(SearchClient {
                    backend: Arc::clone(&self.backend),
                    index: index_name.to_string(),
                    dimensions: self.dimensions,
                })
            })
            .await?;
        Ok(client.clone())
    }

    /// Names of indexes with an initialised client.
    pub async fn cached_indexes(&self) -> Vec<String> {
        let clients = self.clients.lock().await;
        let mut names: Vec<String> = clients
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::IndexSchema;
    use crate::backend::memory::MemoryBackend;
    use crate::config::DriftPolicy;
    use crate::errors::RagError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinSet;

    fn router(be: Arc<dyn SearchBackend>) -> IndexRouter {
        let schema = SchemaManager::new(be.clone(), DriftPolicy::Recreate);
        IndexRouter::new(be, schema, "rag-", 4)
    }

    #[test]
    fn name_wins_over_id_unless_blank() {
        assert_eq!(route_key("c1", Some("Project X")), "Project X");
        assert_eq!(route_key("c1", Some("   ")), "c1");
        assert_eq!(route_key("c1", None), "c1");
    }

    #[tokio::test]
    async fn same_key_resolves_to_same_index() {
        let be = Arc::new(MemoryBackend::new());
        let r = router(be.clone());
        let a = r.resolve_client("c1", Some("Team Notes")).await.unwrap();
        let b = r.resolve_client("c2", Some("team notes")).await.unwrap();
        assert_eq!(a.index_name(), "rag-team-notes");
        assert_eq!(a.index_name(), b.index_name());
        assert_eq!(be.create_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_resolution_creates_once() {
        let be = Arc::new(MemoryBackend::new());
        let r = Arc::new(router(be.clone()));

        let mut set = JoinSet::new();
        for _ in 0..16 {
            let r = r.clone();
            set.spawn(async move { r.resolve_client("shared", None).await.map(|c| c.index) });
        }
        while let Some(res) = set.join_next().await {
            assert_eq!(res.unwrap().unwrap(), "rag-shared");
        }
        assert_eq!(be.create_calls(), 1);
        assert_eq!(r.cached_indexes().await, vec!["rag-shared".to_string()]);
    }

    /// Fails the first `get_index` call, then behaves like memory.
    struct FlakyBackend {
        inner: MemoryBackend,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl SearchBackend for FlakyBackend {
        async fn get_index(&self, name: &str) -> RagResult<Option<IndexSchema>> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RagError::Backend("unavailable".into()));
            }
            self.inner.get_index(name).await
        }
        async fn create_index(&self, schema: &IndexSchema) -> RagResult<()> {
            self.inner.create_index(schema).await
        }
        async fn delete_index(&self, name: &str) -> RagResult<()> {
            self.inner.delete_index(name).await
        }
        async fn upload_documents(
            &self,
            index: &str,
            records: Vec<ChunkRecord>,
        ) -> RagResult<Vec<UploadResult>> {
            self.inner.upload_documents(index, records).await
        }
        async fn search(
            &self,
            index: &str,
            request: &SearchRequest,
        ) -> RagResult<Vec<SearchDocument>> {
            self.inner.search(index, request).await
        }
        async fn delete_documents(&self, index: &str, ids: &[String]) -> RagResult<usize> {
            self.inner.delete_documents(index, ids).await
        }
    }

    #[tokio::test]
    async fn failed_initialisation_is_retried() {
        let be = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicUsize::new(1),
        });
        let r = router(be.clone());
        assert!(r.resolve_client("c1", None).await.is_err());
        assert!(r.cached_indexes().await.is_empty());
        let c = r.resolve_client("c1", None).await.unwrap();
        assert_eq!(c.index_name(), "rag-c1");
    }
}
