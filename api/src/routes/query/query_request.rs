use serde::Deserialize;

/// Request payload for /query and /chat.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub chat_id: String,
    /// Selects the chat's index; falls back to `chat_id` when absent.
    #[serde(default)]
    pub chat_name: Option<String>,
}
