//! Document ingestion: extract → split → embed → upload into the chat's index.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::RagStore;
use crate::errors::{RagError, RagResult};
use crate::naming::sanitize_document_id;
use crate::record::{ChunkRecord, IngestOutcome};

impl RagStore {
    /// Indexes one uploaded file for `chat_id`.
    ///
    /// Never returns an error: every failure is reported through
    /// [`IngestOutcome::success`] and its message.
    pub async fn process_document(
        &self,
        file_path: impl AsRef<Path>,
        filename: &str,
        chat_id: &str,
        chat_name: Option<&str>,
    ) -> IngestOutcome {
        if chat_id.trim().is_empty() {
            return IngestOutcome::failed("chat_id is required to process documents.");
        }

        match self
            .ingest(file_path.as_ref(), filename, chat_id, chat_name)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(chat_id, filename, error = %e, "document ingestion failed");
                IngestOutcome::failed(format!("Error processing document: {e}"))
            }
        }
    }

    async fn ingest(
        &self,
        file_path: &Path,
        filename: &str,
        chat_id: &str,
        chat_name: Option<&str>,
    ) -> RagResult<IngestOutcome> {
        let client = self.router.resolve_client(chat_id, chat_name).await?;

        let extension = doc_extract::extension_of(file_path);
        let text = self
            .extractor
            .extract(file_path.to_path_buf(), &extension)
            .await?;
        if text.trim().is_empty() {
            warn!(chat_id, filename, "no text extracted");
            return Ok(IngestOutcome::failed("No text could be extracted from the file"));
        }

        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            return Ok(IngestOutcome::failed(
                "No chunks were produced from this document.",
            ));
        }
        debug!(chat_id, filename, chunks = chunks.len(), "document split");

        let vectors = self.embedder.embed_batch(&chunks).await?;
        let Some(first) = vectors.first() else {
            return Ok(IngestOutcome::failed("Embedding service returned no vectors."));
        };
        if first.len() != client.dimensions() {
            warn!(
                index = client.index_name(),
                expected = client.dimensions(),
                got = first.len(),
                "embedding dimension mismatch"
            );
            return Err(RagError::DimensionMismatch {
                index: client.index_name().to_string(),
                expected: client.dimensions(),
                got: first.len(),
            });
        }

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let scoped = format!("{chat_id}_{filename}");
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (content, content_vector))| ChunkRecord {
                id: sanitize_document_id(&scoped, i),
                content,
                content_vector,
                source: filename.to_string(),
                chat_id: chat_id.to_string(),
            })
            .collect();
        let count = records.len();

        let results = client.upload(records).await?;
        let failed: Vec<_> = results.iter().filter(|r| !r.succeeded).collect();
        if let Some(first_failure) = failed.first() {
            let reason = first_failure
                .error_message
                .as_deref()
                .unwrap_or("unknown error");
            warn!(
                index = client.index_name(),
                failed = failed.len(),
                reason,
                "some chunks were rejected"
            );
            return Ok(IngestOutcome::failed(format!(
                "Failed to index {} chunk(s). First error: {reason}",
                failed.len()
            )));
        }

        info!(
            chat_id,
            filename,
            index = client.index_name(),
            chunks = count,
            "document indexed"
        );
        Ok(IngestOutcome {
            success: true,
            message: format!("Successfully processed {filename} for chat {chat_id}"),
            chunks: count,
        })
    }
}
