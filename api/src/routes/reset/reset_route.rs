//! POST /reset: forget a chat's history, indexed chunks and uploads.

use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use rag_store::ResetOutcome;
use tracing::{error, info};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::{reset::reset_request::ResetRequest, upload::upload_storage::delete_chat_uploads},
};

/// Handler: POST /reset
pub async fn reset(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ResetRequest>, JsonRejection>,
) -> AppResult<Json<ResetOutcome>> {
    let Json(body) = body?;
    let chat_id = body.chat_id.trim();
    if chat_id.is_empty() {
        return Err(AppError::BadRequest("chat_id is required".into()));
    }

    let store = state.core.get().await?;
    let outcome = store.reset(Some(chat_id)).await.map_err(|e| {
        error!(chat_id, error = %e, "reset failed");
        AppError::from(e)
    })?;

    delete_chat_uploads(&state.settings.upload_dir, chat_id).await;
    info!(chat_id, deleted = outcome.deleted, "chat reset");
    Ok(Json(outcome))
}
