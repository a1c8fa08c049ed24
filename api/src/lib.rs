//! HTTP surface of the document chat backend.

mod core;
mod error_handler;
mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub use crate::core::app_state::{ApiSettings, AppState, CoreFuture, CoreInit, RagCore};
pub use crate::error_handler::{AppError, AppResult};

use crate::routes::{
    index::index_route::{health, index},
    query::query_route::query,
    reset::reset_route::reset,
    status::status_route::status,
    upload::upload_route::upload,
};

/// Room for multipart framing and text fields around the file itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Reads settings from the environment, initialises the RAG core and serves
/// until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let settings = ApiSettings::from_env()?;
    let state = Arc::new(AppState::new(settings, RagCore::from_env()));

    // A failed first attempt is retried on the next request that needs the core.
    if let Err(e) = state.core.get().await {
        warn!(error = %e, "starting without a ready rag core");
    }

    let address = state.settings.address.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(AppError::Bind)?;
    info!(%address, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Builds the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings.cors_origins);
    let body_limit = state
        .settings
        .max_file_size_bytes()
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .route("/chat", post(query))
        .route("/status", get(status))
        .route("/reset", post(reset))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests;
