//! Question answering over a chat's indexed chunks.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::RagStore;
use crate::backend::{FieldFilter, SearchDocument, SearchRequest, VectorQuery};
use crate::errors::RagResult;
use crate::prompt::{build_prompt, format_history};
use crate::record::{HistoryEntry, QueryOutcome, SourceRef, fields};

/// Answer returned when no chunk of the chat matches the question.
pub const NOT_FOUND_ANSWER: &str =
    "I couldn't find any relevant information in the uploaded documents to answer your question.";

const SOURCE_PREVIEW_CHARS: usize = 200;

impl RagStore {
    /// Answers `question` from the chat's documents and recent history.
    ///
    /// Queries for the same chat run one at a time; the answer is appended
    /// to that chat's history before the lock is released.
    pub async fn query(
        &self,
        question: &str,
        chat_id: &str,
        chat_name: Option<&str>,
    ) -> QueryOutcome {
        if chat_id.trim().is_empty() {
            return QueryOutcome::failed("chat_id is required to perform a query.");
        }

        let handle = self.state.session(chat_id).await;
        let mut session = handle.lock().await;

        let history = session.recent(self.cfg.history_window).to_vec();
        match self.answer(question, chat_id, chat_name, &history).await {
            Ok(Some((answer, sources))) => {
                session.push(question, answer.clone());
                QueryOutcome {
                    success: true,
                    answer,
                    sources,
                }
            }
            Ok(None) => QueryOutcome {
                success: true,
                answer: NOT_FOUND_ANSWER.to_string(),
                sources: Vec::new(),
            },
            Err(e) => {
                error!(chat_id, error = %e, "query failed");
                QueryOutcome::failed(format!("Error processing query: {e}"))
            }
        }
    }

    /// `None` when retrieval finds nothing for the chat.
    async fn answer(
        &self,
        question: &str,
        chat_id: &str,
        chat_name: Option<&str>,
        history: &[HistoryEntry],
    ) -> RagResult<Option<(String, Vec<SourceRef>)>> {
        let client = self.router.resolve_client(chat_id, chat_name).await?;
        let vector = self.embedder.embed_one(question).await?;

        let filter = FieldFilter::eq(fields::CHAT_ID, chat_id);
        debug!(index = client.index_name(), filter = %filter.expression(), "vector search");
        let request = SearchRequest {
            vector: Some(VectorQuery {
                vector,
                k: self.cfg.top_k,
                field: fields::CONTENT_VECTOR.to_string(),
            }),
            filter: Some(filter),
            select: vec![fields::CONTENT.to_string(), fields::SOURCE.to_string()],
            top: None,
        };
        let hits = client.search(&request).await?;
        if hits.is_empty() {
            info!(chat_id, index = client.index_name(), "no matching chunks");
            return Ok(None);
        }

        let contents: Vec<&str> = hits.iter().map(content_of).collect();
        let context = contents.join("\n\n");
        let sources = hits.iter().map(make_source_ref).collect();

        let prompt = build_prompt(&format_history(history), &context, question);
        let answer = self.chat.complete(&prompt).await?;
        info!(chat_id, hits = hits.len(), "query answered");
        Ok(Some((answer, sources)))
    }
}

fn str_field<'a>(doc: &'a SearchDocument, name: &str) -> Option<&'a str> {
    doc.get(name).and_then(Value::as_str)
}

fn content_of(doc: &SearchDocument) -> &str {
    str_field(doc, fields::CONTENT).unwrap_or_default()
}

/// Preview of a hit: first 200 characters plus `...`, and its source file.
pub fn make_source_ref(doc: &SearchDocument) -> SourceRef {
    let preview: String = content_of(doc).chars().take(SOURCE_PREVIEW_CHARS).collect();
    let source = str_field(doc, fields::SOURCE)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown");
    SourceRef {
        content: format!("{preview}..."),
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> SearchDocument {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn source_preview_is_truncated_by_chars() {
        let long = "я".repeat(250);
        let r = make_source_ref(&doc(json!({"content": long, "source": "ru.txt"})));
        assert_eq!(r.content.chars().count(), 203);
        assert!(r.content.ends_with("..."));
        assert_eq!(r.source, "ru.txt");
    }

    #[test]
    fn short_content_still_gets_ellipsis() {
        let r = make_source_ref(&doc(json!({"content": "tiny"})));
        assert_eq!(r.content, "tiny...");
        assert_eq!(r.source, "Unknown");
    }

    #[test]
    fn empty_source_is_unknown() {
        let r = make_source_ref(&doc(json!({"content": "x", "source": ""})));
        assert_eq!(r.source, "Unknown");
    }
}
