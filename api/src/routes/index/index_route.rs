//! GET / and GET /health.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{Query, State},
    extract::rejection::QueryRejection,
};
use tracing::debug;

use crate::{
    core::app_state::AppState,
    error_handler::AppResult,
    routes::index::health_response::{HealthParams, HealthResponse, IndexResponse, SERVICE_NAME},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handler: GET /
pub async fn index() -> Json<IndexResponse> {
    let endpoints = BTreeMap::from([
        ("health", "/health"),
        ("upload", "/upload"),
        ("chat", "/chat"),
        ("query", "/query"),
        ("status", "/status"),
        ("reset", "/reset"),
    ]);
    Json(IndexResponse {
        message: format!("{SERVICE_NAME} is running"),
        version: VERSION,
        endpoints,
    })
}

/// Handler: GET /health
///
/// Reports the core as it is right now; does not trigger initialisation.
///
/// # Example
/// ```bash
/// curl 'http://127.0.0.1:8000/health?llm=true'
/// ```
pub async fn health(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HealthParams>, QueryRejection>,
) -> AppResult<Json<HealthResponse>> {
    let Query(params) = params?;

    let Some(store) = state.core.current() else {
        let error = state.core.last_error().await;
        debug!(?error, "health: rag core not initialised");
        return Ok(Json(HealthResponse {
            status: "degraded",
            service: SERVICE_NAME,
            version: VERSION,
            rag_indexer: "not initialized",
            error,
            llm: None,
        }));
    };

    let llm = if params.llm {
        Some(store.llm_health().await)
    } else {
        None
    };
    Ok(Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: VERSION,
        rag_indexer: "ready",
        error: None,
        llm,
    }))
}
