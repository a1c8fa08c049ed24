//! Model seams: embedding, chat completion and text extraction.
//!
//! The store talks to these traits only; [`LlmServiceProfiles`] and
//! [`DocExtractor`] are the production implementations, tests plug in fakes.

use std::path::PathBuf;

use ai_llm_service::LlmServiceProfiles;
use async_trait::async_trait;

use crate::errors::{RagError, RagResult};

/// Produces embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `texts` in order; returns one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| RagError::Embedding("Embedding service returned no vectors.".into()))
    }
}

/// Completes a fully rendered prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> RagResult<String>;
}

/// Turns an uploaded file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: PathBuf, extension: &str) -> RagResult<String>;
}

#[async_trait]
impl Embedder for LlmServiceProfiles {
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Ok(LlmServiceProfiles::embed_batch(self, texts).await?)
    }

    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        Ok(self.embed(text).await?)
    }
}

#[async_trait]
impl ChatModel for LlmServiceProfiles {
    async fn complete(&self, prompt: &str) -> RagResult<String> {
        Ok(self.generate(prompt, None).await?)
    }
}

/// Extracts PDF, DOCX and TXT on the blocking pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocExtractor;

#[async_trait]
impl TextExtractor for DocExtractor {
    async fn extract(&self, path: PathBuf, extension: &str) -> RagResult<String> {
        let extension = extension.to_string();
        let text = tokio::task::spawn_blocking(move || doc_extract::extract(&path, &extension))
            .await
            .map_err(|e| RagError::Internal(format!("extraction task failed: {e}")))??;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct Fixed;

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct Empty;

    #[async_trait]
    impl Embedder for Empty {
        async fn embed_batch(&self, _: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn embed_one_uses_batch() {
        assert_eq!(Fixed.embed_one("abc").await.unwrap(), vec![3.0]);
        assert!(matches!(
            Empty.embed_one("abc").await,
            Err(RagError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn doc_extractor_reads_text_files() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "plain text body").unwrap();
        let text = DocExtractor
            .extract(file.path().to_path_buf(), ".txt")
            .await
            .unwrap();
        assert_eq!(text, "plain text body");
    }

    #[tokio::test]
    async fn doc_extractor_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        let err = DocExtractor
            .extract(file.path().to_path_buf(), ".xls")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }
}
