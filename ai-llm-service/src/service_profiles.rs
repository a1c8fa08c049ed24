//! Shared LLM service with two profiles: `chat` and `embedding`.
//!
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+timeout).

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::info;

use crate::{
    config::{default_config, llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    health_service::{HealthService, HealthStatus},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// Shared service that manages the **chat** and **embedding** profiles.
pub struct LlmServiceProfiles {
    chat: LlmModelConfig,
    embedding: LlmModelConfig,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,

    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a service from explicit profiles.
    pub fn new(
        chat: LlmModelConfig,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        chat.validate()?;
        embedding.validate()?;
        info!(
            chat_provider = %chat.provider,
            chat_model = %chat.model,
            embedding_provider = %embedding.provider,
            embedding_model = %embedding.model,
            "llm profiles configured"
        );
        Ok(Self {
            chat,
            embedding,
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Creates a service from `LLM_KIND` and the provider-specific variables.
    pub fn from_env() -> Result<Self, AiLlmError> {
        Self::new(
            default_config::config_chat()?,
            default_config::config_embedding()?,
            Some(10),
        )
    }

    /// Generates text with the chat profile.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        match self.chat.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.chat).await?;
                cli.generate(prompt, system).await
            }
            LlmProvider::OpenAI | LlmProvider::AzureOpenAI => {
                let cli = self.get_or_init_openai(&self.chat).await?;
                cli.generate(prompt, system).await
            }
        }
    }

    /// Embeds one text with the embedding profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match self.embedding.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings(input).await
            }
            LlmProvider::OpenAI | LlmProvider::AzureOpenAI => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings(input).await
            }
        }
    }

    /// Embeds many texts in one provider call, preserving order.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        match self.embedding.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings_batch(inputs).await
            }
            LlmProvider::OpenAI | LlmProvider::AzureOpenAI => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings_batch(inputs).await
            }
        }
    }

    /// Health snapshot for each distinct profile.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.chat.clone()];
        if self.embedding != self.chat {
            list.push(self.embedding.clone());
        }
        self.health.check_many(&list).await
    }

    /// Returns `(chat, embedding)` profiles.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.chat, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key) {
            return Ok(cli.clone());
        }
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.openai.write().await;
        if let Some(cli) = w.get(&key) {
            return Ok(cli.clone());
        }
        let cli = Arc::new(OpenAiService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama(model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            api_version: None,
            max_tokens: None,
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(30),
        }
    }

    #[tokio::test]
    async fn clients_are_cached_per_config() {
        let svc = LlmServiceProfiles::new(ollama("chat"), ollama("embed"), Some(1)).unwrap();
        let a = svc.get_or_init_ollama(&ollama("chat")).await.unwrap();
        let b = svc.get_or_init_ollama(&ollama("chat")).await.unwrap();
        let c = svc.get_or_init_ollama(&ollama("embed")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn invalid_profile_is_rejected_up_front() {
        let mut bad = ollama("chat");
        bad.endpoint = "nowhere".into();
        assert!(LlmServiceProfiles::new(bad, ollama("embed"), None).is_err());
    }
}
