//! GET /status: whether the base index holds documents.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    extract::rejection::QueryRejection,
};
use rag_store::StatusOutcome;
use serde::Deserialize;

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
};

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Handler: GET /status?chat_id=...
///
/// An unavailable core is reported in the body, not as an error status.
pub async fn status(
    State(state): State<Arc<AppState>>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> AppResult<Json<StatusOutcome>> {
    let Query(params) = params?;
    let store = match state.core.get().await {
        Ok(store) => store,
        Err(AppError::Unavailable(message)) => {
            return Ok(Json(StatusOutcome {
                has_documents: false,
                ready: false,
                message,
            }));
        }
        Err(e) => return Err(e),
    };
    Ok(Json(store.status(params.chat_id.as_deref()).await))
}
