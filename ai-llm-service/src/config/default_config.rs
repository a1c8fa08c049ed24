//! Default LLM configs loaded strictly from environment variables.
//!
//! Two roles are needed by the document chat backend:
//!
//! - **Chat**      → answers questions from retrieved context
//! - **Embedding** → turns chunks and questions into vectors
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = `ollama` (default) | `openai` | `azure`
//! - `LLM_MAX_TOKENS` = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = optional request timeout (u32)
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT`, `OLLAMA_MODEL`, `EMBEDDING_MODEL`
//!
//! OpenAI:
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL` (default `https://api.openai.com`),
//!   `OPENAI_CHAT_MODEL`, `OPENAI_EMBEDDING_MODEL`
//!
//! Azure OpenAI:
//! - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`,
//!   `AZURE_OPENAI_API_VERSION` (default `2025-01-01-preview`),
//!   `AZURE_OPENAI_DEPLOYMENT_NAME`, `AZURE_OPENAI_EMBEDDING_DEPLOYMENT`

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, ConfigError, env_opt, env_opt_u32, must_env},
};

/// Sampling temperature used for grounded answers.
pub const CHAT_TEMPERATURE: f32 = 0.2;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_AZURE_API_VERSION: &str = "2025-01-01-preview";

/// Reads `LLM_KIND`, defaulting to Ollama when unset.
pub fn provider_from_env() -> Result<LlmProvider, AiLlmError> {
    match env_opt("LLM_KIND") {
        Some(kind) => Ok(kind.parse::<LlmProvider>()?),
        None => Ok(LlmProvider::Ollama),
    }
}

/// Chat profile for the provider selected by `LLM_KIND`.
pub fn config_chat() -> Result<LlmModelConfig, AiLlmError> {
    let cfg = match provider_from_env()? {
        LlmProvider::Ollama => config_ollama_chat()?,
        LlmProvider::OpenAI => config_openai_chat()?,
        LlmProvider::AzureOpenAI => config_azure_chat()?,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Embedding profile for the provider selected by `LLM_KIND`.
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    let cfg = match provider_from_env()? {
        LlmProvider::Ollama => config_ollama_embedding()?,
        LlmProvider::OpenAI => config_openai_embedding()?,
        LlmProvider::AzureOpenAI => config_azure_embedding()?,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = env_opt("OLLAMA_URL") {
        return Ok(url);
    }
    if let Some(port) = env_opt("OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

fn timeout_or(default: u64) -> Result<Option<u64>, AiLlmError> {
    Ok(Some(
        env_opt_u32("LLM_TIMEOUT_SECS")?
            .map(u64::from)
            .unwrap_or(default),
    ))
}

fn config_ollama_chat() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("OLLAMA_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        api_version: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(CHAT_TEMPERATURE),
        top_p: None,
        timeout_secs: timeout_or(600)?,
    })
}

fn config_ollama_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        api_version: None,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: timeout_or(120)?,
    })
}

fn openai_base_url() -> String {
    env_opt("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
}

fn config_openai_chat() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: must_env("OPENAI_CHAT_MODEL")?,
        endpoint: openai_base_url(),
        api_key: Some(must_env("OPENAI_API_KEY")?),
        api_version: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(CHAT_TEMPERATURE),
        top_p: None,
        timeout_secs: timeout_or(120)?,
    })
}

fn config_openai_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: must_env("OPENAI_EMBEDDING_MODEL")?,
        endpoint: openai_base_url(),
        api_key: Some(must_env("OPENAI_API_KEY")?),
        api_version: None,
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: timeout_or(60)?,
    })
}

fn azure_api_version() -> String {
    env_opt("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string())
}

fn config_azure_chat() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::AzureOpenAI,
        model: must_env("AZURE_OPENAI_DEPLOYMENT_NAME")?,
        endpoint: must_env("AZURE_OPENAI_ENDPOINT")?,
        api_key: Some(must_env("AZURE_OPENAI_API_KEY")?),
        api_version: Some(azure_api_version()),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(CHAT_TEMPERATURE),
        top_p: None,
        timeout_secs: timeout_or(120)?,
    })
}

fn config_azure_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::AzureOpenAI,
        model: must_env("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")?,
        endpoint: must_env("AZURE_OPENAI_ENDPOINT")?,
        api_key: Some(must_env("AZURE_OPENAI_API_KEY")?),
        api_version: Some(azure_api_version()),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: timeout_or(60)?,
    })
}
