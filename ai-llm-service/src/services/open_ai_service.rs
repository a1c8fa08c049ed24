//! OpenAI-compatible service for chat completions and embeddings.
//!
//! One client covers both the public OpenAI API and Azure OpenAI deployments;
//! they share payloads and differ only in routes and auth header:
//!
//! | Provider    | Chat route                                                    | Auth          |
//! |-------------|---------------------------------------------------------------|---------------|
//! | OpenAI      | `{endpoint}/v1/chat/completions`                              | `Bearer` key  |
//! | AzureOpenAI | `{endpoint}/openai/deployments/{model}/chat/completions?api-version=..` | `api-key` |
//!
//! Embeddings use the sibling `/embeddings` route and accept a batch of inputs.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, HttpError, ProviderError, ProviderErrorKind, make_snippet},
};

/// Thin client for OpenAI-compatible REST APIs.
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is Ollama
    /// - `MissingApiKey` if `cfg.api_key` is `None`
    /// - `InvalidEndpoint` if `cfg.endpoint` is not http(s)
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        let tag = cfg.provider.tag();
        if cfg.provider == LlmProvider::Ollama {
            return Err(ProviderError::new(tag, ProviderErrorKind::InvalidProvider).into());
        }

        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::new(tag, ProviderErrorKind::MissingApiKey))?;

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::new(
                tag,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(60));

        let (auth_name, auth_value) = match cfg.provider {
            LlmProvider::AzureOpenAI => (
                header::HeaderName::from_static("api-key"),
                api_key.clone(),
            ),
            _ => (header::AUTHORIZATION, format!("Bearer {api_key}")),
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(
            auth_name,
            header::HeaderValue::from_str(&auth_value).map_err(|e| {
                ProviderError::new(
                    tag,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = endpoint.trim_end_matches('/');
        let (url_chat, url_embeddings) = match cfg.provider {
            LlmProvider::AzureOpenAI => {
                let version = cfg.api_version.as_deref().unwrap_or_default();
                let deployment = format!("{base}/openai/deployments/{}", cfg.model);
                (
                    format!("{deployment}/chat/completions?api-version={version}"),
                    format!("{deployment}/embeddings?api-version={version}"),
                )
            }
            _ => (
                format!("{base}/v1/chat/completions"),
                format!("{base}/v1/embeddings"),
            ),
        };

        info!(
            provider = %cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a non-streaming chat completion.
    ///
    /// Sends an optional system message followed by the user `prompt`.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system);

        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat, started).await?;

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            error!(error = %e, model = %self.cfg.model, "failed to decode chat completion");
            self.err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; expected `choices[0].message.content`"
            )))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| self.err(ProviderErrorKind::EmptyChoices))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        Ok(content)
    }

    /// Embeds a batch of inputs in one request, preserving input order.
    pub async fn embeddings_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!(
            model = %self.cfg.model,
            inputs = inputs.len(),
            "POST {}", self.url_embeddings
        );

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        let resp = self.check_status(resp, &self.url_embeddings, started).await?;

        let mut out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            error!(error = %e, model = %self.cfg.model, "failed to decode embeddings");
            self.err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; expected `data[].embedding`"
            )))
        })?;

        if out.data.len() != inputs.len() {
            return Err(self
                .err(ProviderErrorKind::EmbeddingCount {
                    got: out.data.len(),
                    want: inputs.len(),
                })
                .into());
        }
        out.data.sort_by_key(|item| item.index);

        info!(
            model = %self.cfg.model,
            inputs = inputs.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );

        Ok(out.data.into_iter().map(|item| item.embedding).collect())
    }

    /// Embeds a single input.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let mut batch = self.embeddings_batch(&[input.to_string()]).await?;
        batch.pop().ok_or_else(|| {
            self.err(ProviderErrorKind::EmbeddingCount { got: 0, want: 1 })
                .into()
        })
    }

    async fn check_status(
        &self,
        resp: reqwest::Response,
        url: &str,
        started: Instant,
    ) -> Result<reqwest::Response, AiLlmError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet = make_snippet(&text);

        error!(
            %status,
            %url,
            %snippet,
            provider = %self.cfg.provider,
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "upstream returned non-success status"
        );

        Err(self
            .err(ProviderErrorKind::HttpStatus(HttpError {
                status,
                url: url.to_string(),
                snippet,
            }))
            .into())
    }

    fn err(&self, kind: ProviderErrorKind) -> ProviderError {
        ProviderError::new(self.cfg.provider.tag(), kind)
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &'a str, system: Option<&'a str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model: &cfg.model,
            messages,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::AzureOpenAI,
            model: "chat-deploy".into(),
            endpoint: "https://example.openai.azure.com/".into(),
            api_key: Some("secret".into()),
            api_version: Some("2025-01-01-preview".into()),
            max_tokens: None,
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn azure_routes_use_deployment_and_api_version() {
        let svc = OpenAiService::new(azure()).unwrap();
        assert_eq!(
            svc.url_chat,
            "https://example.openai.azure.com/openai/deployments/chat-deploy/chat/completions?api-version=2025-01-01-preview"
        );
        assert!(svc.url_embeddings.ends_with("/chat-deploy/embeddings?api-version=2025-01-01-preview"));
    }

    #[test]
    fn openai_routes_use_v1_prefix() {
        let mut cfg = azure();
        cfg.provider = LlmProvider::OpenAI;
        cfg.endpoint = "https://api.openai.com".into();
        let svc = OpenAiService::new(cfg).unwrap();
        assert_eq!(svc.url_chat, "https://api.openai.com/v1/chat/completions");
        assert_eq!(svc.url_embeddings, "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut cfg = azure();
        cfg.api_key = None;
        assert!(OpenAiService::new(cfg).is_err());
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let mut out: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        out.data.sort_by_key(|item| item.index);
        assert_eq!(out.data[0].embedding, vec![1.0]);
    }
}
