use std::collections::BTreeMap;

use ai_llm_service::HealthStatus;
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "RAG Chatbot API";

/// Response payload for `GET /`.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

/// Query parameters for `GET /health`.
#[derive(Debug, Default, Deserialize)]
pub struct HealthParams {
    /// Also probe the chat and embedding providers.
    #[serde(default)]
    pub llm: bool,
}

/// Response payload for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// `ready` or `not initialized`.
    pub rag_indexer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<Vec<HealthStatus>>,
}
