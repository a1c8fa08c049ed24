use serde::Deserialize;

/// Request payload for /reset.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub chat_id: String,
}
