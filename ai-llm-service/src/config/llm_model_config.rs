use crate::{
    config::llm_provider::LlmProvider,
    error_handler::{ConfigError, Result, validate_http_endpoint, validate_range_f32},
};

/// Configuration for an LLM model invocation.
///
/// For [`LlmProvider::AzureOpenAI`] the `model` field holds the deployment
/// name and `api_version` must be set.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier (or Azure deployment name).
    pub model: String,

    /// Base URL of the provider, without route suffixes.
    pub endpoint: String,

    /// API key for providers that require authentication.
    pub api_key: Option<String>,

    /// Azure `api-version` query parameter.
    pub api_version: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks the fields every provider client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        if self.provider == LlmProvider::AzureOpenAI && self.api_version.is_none() {
            return Err(ConfigError::MissingVar("AZURE_OPENAI_API_VERSION").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            api_version: None,
            max_tokens: None,
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn accepts_well_formed_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_temperature_and_empty_model() {
        let mut cfg = base();
        cfg.temperature = Some(3.5);
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.model = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn azure_requires_api_version() {
        let mut cfg = base();
        cfg.provider = LlmProvider::AzureOpenAI;
        assert!(cfg.validate().is_err());
        cfg.api_version = Some("2025-01-01-preview".into());
        assert!(cfg.validate().is_ok());
    }
}
