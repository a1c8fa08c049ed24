//! POST /upload: store a document and index it for a chat.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use doc_extract::{SUPPORTED_EXTENSIONS, extension_of};
use tracing::{info, warn};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::upload::{upload_response::UploadResponse, upload_storage::save_upload},
};

/// Fields collected from the multipart form.
#[derive(Default)]
struct UploadForm {
    chat_id: String,
    chat_name: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("chat_id") => form.chat_id = field.text().await?,
            Some("chat_name") => {
                let name = field.text().await?;
                form.chat_name = Some(name).filter(|n| !n.trim().is_empty());
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Handler: POST /upload (multipart: `chat_id`, optional `chat_name`, `file`)
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8000/upload \
///   -F chat_id=c-42 -F chat_name='Contracts' -F file=@terms.pdf
/// ```
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let store = state.core.get().await?;
    let form = read_form(multipart?).await?;

    let chat_id = form.chat_id.trim().to_string();
    if chat_id.is_empty() {
        return Err(AppError::BadRequest("chat_id is required".into()));
    }
    let Some((filename, bytes)) = form.file.filter(|(name, _)| !name.is_empty()) else {
        return Err(AppError::BadRequest("No file provided".into()));
    };

    let extension = extension_of(&filename);
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported type. Allowed: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    if bytes.len() > state.settings.max_file_size_bytes() {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Limit: {}MB",
            state.settings.max_file_size_mb
        )));
    }

    let path = save_upload(&state.settings.upload_dir, &chat_id, &extension, &bytes).await?;
    let outcome = store
        .process_document(&path, &filename, &chat_id, form.chat_name.as_deref())
        .await;
    if !outcome.success {
        warn!(%chat_id, %filename, message = %outcome.message, "upload rejected");
        return Err(AppError::BadRequest(outcome.message));
    }

    info!(%chat_id, %filename, chunks = outcome.chunks, "upload indexed");
    Ok(Json(UploadResponse {
        success: true,
        message: outcome.message,
        filename,
        chunks: outcome.chunks,
        chat_id,
        has_documents: true,
    }))
}
