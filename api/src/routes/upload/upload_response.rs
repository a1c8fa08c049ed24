use serde::Serialize;

/// Response payload for a successful /upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub chunks: usize,
    pub chat_id: String,
    pub has_documents: bool,
}
