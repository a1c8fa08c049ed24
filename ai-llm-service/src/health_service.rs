//! Health probes for LLM backends.
//!
//! - Ollama: `GET {endpoint}/api/tags` (model presence check)
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth
//! - Azure OpenAI: `GET {endpoint}/openai/models?api-version=..` with `api-key`
//!
//! [`HealthService::check`] never fails; errors become `ok = false`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

/// A serializable health snapshot for a single provider/config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: Option<String>,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.to_string(),
            endpoint: cfg.endpoint.clone(),
            model: Some(cfg.model.clone()),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// Health checker reusing one HTTP client for every probe.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// Creates a new health service with an optional client timeout (seconds).
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Checks a single config. Failures are reported, not returned.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let started = Instant::now();
        let result = match cfg.provider {
            LlmProvider::Ollama => self.try_probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.try_probe_openai(cfg).await,
            LlmProvider::AzureOpenAI => self.try_probe_azure(cfg).await,
        };
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(message) => {
                debug!(provider = %cfg.provider, model = %cfg.model, latency_ms, "health ok");
                HealthStatus::new(cfg, true, latency_ms, message)
            }
            Err(e) => {
                warn!(provider = %cfg.provider, model = %cfg.model, error = %e, "health check failed");
                HealthStatus::new(cfg, false, latency_ms, e.to_string())
            }
        }
    }

    /// Checks several configs sequentially.
    pub async fn check_many(&self, cfgs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(cfgs.len());
        for cfg in cfgs {
            out.push(self.check(cfg).await);
        }
        out
    }

    async fn try_probe_ollama(&self, cfg: &LlmModelConfig) -> Result<String, AiLlmError> {
        let url = format!("{}/api/tags", base_url(cfg)?);
        let resp = self.get(self.client.get(&url), cfg, &url).await?;

        let tags: OllamaTags = resp
            .json()
            .await
            .map_err(|e| HealthError::Decode(format!("ollama tags: {e}")))?;
        let present = tags
            .models
            .iter()
            .any(|m| m.name == cfg.model || m.name.split(':').next() == Some(cfg.model.as_str()));

        Ok(if present {
            format!("model '{}' available", cfg.model)
        } else {
            format!("reachable, model '{}' not pulled", cfg.model)
        })
    }

    async fn try_probe_openai(&self, cfg: &LlmModelConfig) -> Result<String, AiLlmError> {
        let url = format!("{}/v1/models", base_url(cfg)?);
        let key = cfg.api_key.clone().unwrap_or_default();
        let req = self.client.get(&url).bearer_auth(key);
        self.get(req, cfg, &url).await?;
        Ok("models endpoint reachable".to_string())
    }

    async fn try_probe_azure(&self, cfg: &LlmModelConfig) -> Result<String, AiLlmError> {
        let url = format!(
            "{}/openai/models?api-version={}",
            base_url(cfg)?,
            cfg.api_version.as_deref().unwrap_or_default()
        );
        let key = cfg.api_key.clone().unwrap_or_default();
        let req = self.client.get(&url).header("api-key", key);
        self.get(req, cfg, &url).await?;
        Ok("deployment endpoint reachable".to_string())
    }

    async fn get(
        &self,
        req: reqwest::RequestBuilder,
        cfg: &LlmModelConfig,
        url: &str,
    ) -> Result<reqwest::Response, AiLlmError> {
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
            .min(self.default_timeout);

        let resp = req
            .timeout(timeout)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiLlmError::Timeout(timeout)
                } else {
                    AiLlmError::HttpTransport(e)
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HealthError::HttpStatus(HttpError {
                status,
                url: url.to_string(),
                snippet: make_snippet(&text),
            })
            .into());
        }
        Ok(resp)
    }
}

fn base_url(cfg: &LlmModelConfig) -> Result<&str, AiLlmError> {
    let endpoint = cfg.endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/'))
    } else {
        Err(HealthError::InvalidEndpoint(cfg.endpoint.clone()).into())
    }
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_endpoint_reports_failure_without_network() {
        let svc = HealthService::new(Some(1)).unwrap();
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            endpoint: "localhost:11434".into(),
            api_key: None,
            api_version: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        };
        let status = svc.check(&cfg).await;
        assert!(!status.ok);
        assert!(status.message.contains("invalid endpoint"));
        assert_eq!(status.provider, "Ollama");
    }
}
