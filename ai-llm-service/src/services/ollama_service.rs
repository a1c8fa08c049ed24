//! Lightweight Ollama service for text generation and embeddings.
//!
//! - `POST {endpoint}/api/generate`: synchronous text generation (`stream=false`)
//! - `POST {endpoint}/api/embed`: batch embeddings

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use crate::error_handler::{
    AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, make_snippet,
};

/// Thin client for Ollama.
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is not http(s)
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(err(ProviderErrorKind::InvalidProvider).into());
        }

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(err(ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone())).into());
        }

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(60));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .brotli(true)
            .build()?;

        let base = endpoint.trim_end_matches('/');
        let url_generate = format!("{base}/api/generate");
        let url_embed = format!("{base}/api/embed");

        Ok(Self {
            client,
            cfg,
            url_generate,
            url_embed,
        })
    }

    /// Performs a non-streaming generation request via `/api/generate`.
    ///
    /// `system` is forwarded as Ollama's `system` field when present.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        let body = GenerateRequest::from_cfg(&self.cfg, prompt, system);

        debug!("POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, &self.url_generate).await?;

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; ensure `stream=false` is used"
            )))
        })?;

        Ok(out.response)
    }

    /// Embeds a batch of inputs via `/api/embed`, preserving order.
    #[instrument(skip_all, fields(model = %self.cfg.model, inputs = inputs.len()))]
    pub async fn embeddings_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;
        let resp = check_status(resp, &self.url_embed).await?;

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; expected `{{ embeddings: number[][] }}`"
            )))
        })?;

        if out.embeddings.len() != inputs.len() {
            return Err(err(ProviderErrorKind::EmbeddingCount {
                got: out.embeddings.len(),
                want: inputs.len(),
            })
            .into());
        }
        Ok(out.embeddings)
    }

    /// Embeds a single input.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let mut batch = self.embeddings_batch(&[input.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| err(ProviderErrorKind::EmbeddingCount { got: 0, want: 1 }).into())
    }
}

fn err(kind: ProviderErrorKind) -> ProviderError {
    ProviderError::new(Provider::Ollama, kind)
}

async fn check_status(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, AiLlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    Err(err(ProviderErrorKind::HttpStatus(HttpError {
        status,
        url: url.to_string(),
        snippet: make_snippet(&text),
    }))
    .into())
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

impl<'a> GenerateRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &'a str, system: Option<&'a str>) -> Self {
        Self {
            model: &cfg.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens,
            },
        }
    }
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_skips_missing_system() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            api_version: None,
            max_tokens: Some(64),
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: None,
        };
        let body = serde_json::to_value(GenerateRequest::from_cfg(&cfg, "hi", None)).unwrap();
        assert!(body.get("system").is_none());
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 64);
    }

    #[test]
    fn rejects_foreign_provider() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: Some("k".into()),
            api_version: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        };
        assert!(OllamaService::new(cfg).is_err());
    }
}
