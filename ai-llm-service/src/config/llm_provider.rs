use std::fmt;
use std::str::FromStr;

use crate::error_handler::{ConfigError, Provider};

/// Backend used for chat completions and embeddings.
///
/// Parsed from `LLM_KIND` (`ollama`, `openai`, `azure`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Public OpenAI API (Bearer auth, `/v1/...` routes).
    OpenAI,
    /// Azure OpenAI deployment (`api-key` header, deployment routes + `api-version`).
    AzureOpenAI,
}

impl LlmProvider {
    /// Error attribution tag for this provider.
    pub fn tag(self) -> Provider {
        match self {
            LlmProvider::Ollama => Provider::Ollama,
            LlmProvider::OpenAI => Provider::OpenAI,
            LlmProvider::AzureOpenAI => Provider::AzureOpenAI,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tag().fmt(f)
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "chatgpt" => Ok(LlmProvider::OpenAI),
            "azure" | "azure_openai" | "azure-openai" => Ok(LlmProvider::AzureOpenAI),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds_case_insensitively() {
        assert_eq!("Ollama".parse::<LlmProvider>().ok(), Some(LlmProvider::Ollama));
        assert_eq!("chatgpt".parse::<LlmProvider>().ok(), Some(LlmProvider::OpenAI));
        assert_eq!(" AZURE ".parse::<LlmProvider>().ok(), Some(LlmProvider::AzureOpenAI));
        assert!("bedrock".parse::<LlmProvider>().is_err());
    }
}
