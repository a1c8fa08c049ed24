use std::{future::Future, path::PathBuf, pin::Pin, sync::Arc};

use rag_store::{RagResult, RagStore};
use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info};

use crate::error_handler::AppError;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 30;
const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:3000",
];

/// HTTP-layer settings.
#[derive(Clone, Debug)]
pub struct ApiSettings {
    pub address: String,
    /// Root under which uploads are stored per chat.
    pub upload_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub cors_origins: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ApiSettings {
    /// Reads `API_ADDRESS`, `UPLOAD_DIR`, `MAX_FILE_SIZE_MB` and `CORS_ORIGINS`.
    pub fn from_env() -> Result<Self, AppError> {
        let d = Self::default();
        let max_file_size_mb = match env_opt("MAX_FILE_SIZE_MB") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                AppError::Config(format!("MAX_FILE_SIZE_MB must be a positive integer, got '{v}'"))
            })?,
            None => d.max_file_size_mb,
        };
        if max_file_size_mb == 0 {
            return Err(AppError::Config("MAX_FILE_SIZE_MB must be > 0".into()));
        }

        let cors_origins = match env_opt("CORS_ORIGINS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => d.cors_origins,
        };

        Ok(Self {
            address: env_opt("API_ADDRESS").unwrap_or(d.address),
            upload_dir: env_opt("UPLOAD_DIR").map(PathBuf::from).unwrap_or(d.upload_dir),
            max_file_size_mb,
            cors_origins,
        })
    }

    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub type CoreFuture = Pin<Box<dyn Future<Output = RagResult<RagStore>> + Send>>;
pub type CoreInit = Arc<dyn Fn() -> CoreFuture + Send + Sync>;

/// Lazily built RAG core. A failed build is retried by the next caller.
pub struct RagCore {
    init: CoreInit,
    store: OnceCell<Arc<RagStore>>,
    last_error: RwLock<Option<String>>,
}

impl RagCore {
    pub fn new(init: CoreInit) -> Self {
        Self {
            init,
            store: OnceCell::new(),
            last_error: RwLock::new(None),
        }
    }

    /// Core built from the environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(|| -> CoreFuture { Box::pin(RagStore::from_env()) }))
    }

    /// Returns the store, building it first if needed.
    ///
    /// Concurrent callers share one build attempt; a failed attempt leaves the
    /// cell empty.
    pub async fn get(&self) -> Result<Arc<RagStore>, AppError> {
        let built = self
            .store
            .get_or_try_init(|| async {
                info!("initialising rag core");
                let store = (self.init)().await?;
                info!("rag core ready");
                Ok::<_, rag_store::RagError>(Arc::new(store))
            })
            .await;

        match built {
            Ok(store) => {
                if self.last_error.read().await.is_some() {
                    *self.last_error.write().await = None;
                }
                Ok(Arc::clone(store))
            }
            Err(e) => {
                error!(error = %e, "rag core initialisation failed");
                let detail = e.to_string();
                *self.last_error.write().await = Some(detail.clone());
                Err(AppError::Unavailable(format!(
                    "RAG indexer unavailable. Check LLM and search backend configuration. Details: {detail}"
                )))
            }
        }
    }

    /// The store if already built. Never triggers or waits on initialisation.
    pub fn current(&self) -> Option<Arc<RagStore>> {
        self.store.get().cloned()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }
}

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub settings: ApiSettings,
    pub core: RagCore,
}

impl AppState {
    pub fn new(settings: ApiSettings, core: RagCore) -> Self {
        Self { settings, core }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::RagError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults() {
        let s = ApiSettings::default();
        assert_eq!(s.address, "0.0.0.0:8000");
        assert_eq!(s.max_file_size_bytes(), 30 * 1024 * 1024);
        assert_eq!(s.cors_origins.len(), 4);
    }

    #[tokio::test]
    async fn failed_init_is_reported_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let core = RagCore::new(Arc::new(move || -> CoreFuture {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(RagError::Config("no credentials".into())) })
        }));

        let Err(err) = core.get().await else {
            panic!("init should fail");
        };
        assert!(matches!(err, AppError::Unavailable(ref m) if m.ends_with("no credentials")));
        assert_eq!(core.last_error().await.as_deref(), Some("config error: no credentials"));
        assert!(core.current().is_none());

        assert!(core.get().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn built_core_stays_visible_while_handlers_fetch_it() {
        let core = Arc::new(RagCore::new(Arc::new(|| -> CoreFuture {
            Box::pin(async {
                let cfg = rag_store::RagConfig {
                    backend: rag_store::BackendKind::Memory,
                    vector_dimensions: Some(2),
                    ..rag_store::RagConfig::default()
                };
                RagStore::new(
                    cfg,
                    Arc::new(rag_store::MemoryBackend::new()),
                    Arc::new(Unit),
                    Arc::new(Unit),
                )
                .await
            })
        })));
        core.get().await.unwrap();

        let fetchers: Vec<_> = (0..3)
            .map(|_| {
                let core = Arc::clone(&core);
                tokio::spawn(async move {
                    for _ in 0..20_000 {
                        core.get().await.unwrap();
                    }
                })
            })
            .collect();

        let mut missing = 0;
        for _ in 0..20_000 {
            if core.current().is_none() {
                missing += 1;
            }
            tokio::task::yield_now().await;
        }
        for f in fetchers {
            f.await.unwrap();
        }
        assert_eq!(missing, 0);
        assert!(core.last_error().await.is_none());
    }

    struct Unit;

    #[async_trait::async_trait]
    impl rag_store::Embedder for Unit {
        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[async_trait::async_trait]
    impl rag_store::ChatModel for Unit {
        async fn complete(&self, _prompt: &str) -> RagResult<String> {
            Ok(String::new())
        }
    }
}
