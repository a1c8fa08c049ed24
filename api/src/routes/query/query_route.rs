//! POST /query and POST /chat: grounded answers from a chat's documents.

use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use rag_store::QueryOutcome;
use tracing::debug;

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::query::query_request::QueryRequest,
};

/// Handler: POST /query (also mounted at /chat)
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8000/query \
///   -H 'content-type: application/json' \
///   -d '{"question":"What is the refund policy?","chat_id":"c-42"}'
/// ```
pub async fn query(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> AppResult<Json<QueryOutcome>> {
    let Json(body) = body?;
    if body.question.trim().is_empty() {
        return Err(AppError::BadRequest("Question cannot be empty".into()));
    }
    if body.chat_id.trim().is_empty() {
        return Err(AppError::BadRequest("chat_id is required".into()));
    }

    let store = state.core.get().await?;
    debug!(chat_id = %body.chat_id, "query: start");
    let outcome = store
        .query(&body.question, &body.chat_id, body.chat_name.as_deref())
        .await;
    Ok(Json(outcome))
}
