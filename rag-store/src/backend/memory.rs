//! Process-local backend: exact cosine search over in-memory maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{IndexSchema, SearchBackend, SearchDocument, SearchRequest, UploadResult, project};
use crate::errors::{RagError, RagResult};
use crate::record::{ChunkRecord, fields};

struct MemoryIndex {
    schema: IndexSchema,
    docs: BTreeMap<String, ChunkRecord>,
}

/// In-memory [`SearchBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
    delete_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held by `index` (0 if absent).
    pub async fn document_count(&self, index: &str) -> usize {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|i| i.docs.len())
            .unwrap_or(0)
    }

    /// Number of `delete_documents` requests served so far.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::Relaxed)
    }

    /// Number of `create_index` requests served so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }
}

fn to_document(rec: &ChunkRecord) -> SearchDocument {
    let mut doc = SearchDocument::new();
    doc.insert(fields::ID.into(), Value::String(rec.id.clone()));
    doc.insert(fields::CHAT_ID.into(), Value::String(rec.chat_id.clone()));
    doc.insert(fields::CONTENT.into(), Value::String(rec.content.clone()));
    doc.insert(fields::SOURCE.into(), Value::String(rec.source.clone()));
    doc
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MIN;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn missing(index: &str) -> RagError {
    RagError::Backend(format!("index '{index}' not found"))
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn get_index(&self, name: &str) -> RagResult<Option<IndexSchema>> {
        Ok(self.indexes.read().await.get(name).map(|i| i.schema.clone()))
    }

    async fn create_index(&self, schema: &IndexSchema) -> RagResult<()> {
        let mut guard = self.indexes.write().await;
        if guard.contains_key(&schema.name) {
            return Err(RagError::Backend(format!(
                "index '{}' already exists",
                schema.name
            )));
        }
        guard.insert(
            schema.name.clone(),
            MemoryIndex {
                schema: schema.clone(),
                docs: BTreeMap::new(),
            },
        );
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> RagResult<()> {
        self.indexes
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| missing(name))
    }

    async fn upload_documents(
        &self,
        index: &str,
        records: Vec<ChunkRecord>,
    ) -> RagResult<Vec<UploadResult>> {
        let mut guard = self.indexes.write().await;
        let idx = guard.get_mut(index).ok_or_else(|| missing(index))?;
        let dims = idx.schema.vector.as_ref().map(|v| v.dimensions);

        let mut results = Vec::with_capacity(records.len());
        for rec in records {
            match dims {
                Some(d) if rec.content_vector.len() != d => results.push(UploadResult {
                    id: rec.id.clone(),
                    succeeded: false,
                    error_message: Some(format!(
                        "vector has {} dimensions, field expects {d}",
                        rec.content_vector.len()
                    )),
                }),
                _ => {
                    results.push(UploadResult {
                        id: rec.id.clone(),
                        succeeded: true,
                        error_message: None,
                    });
                    idx.docs.insert(rec.id.clone(), rec);
                }
            }
        }
        Ok(results)
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> RagResult<Vec<SearchDocument>> {
        let guard = self.indexes.read().await;
        let idx = guard.get(index).ok_or_else(|| missing(index))?;

        let candidates = idx.docs.values().filter(|rec| match &request.filter {
            Some(f) => f.matches(&to_document(rec)),
            None => true,
        });

        let mut hits: Vec<&ChunkRecord> = match &request.vector {
            Some(q) => {
                let mut scored: Vec<(f32, &ChunkRecord)> = candidates
                    .map(|rec| (cosine(&q.vector, &rec.content_vector), rec))
                    .collect();
                scored.sort_by(|a, b| b.0.total_cmp(&a.0));
                scored.into_iter().take(q.k).map(|(_, rec)| rec).collect()
            }
            None => candidates.collect(),
        };
        if let Some(top) = request.top {
            hits.truncate(top);
        }

        Ok(hits
            .into_iter()
            .map(|rec| project(to_document(rec), &request.select))
            .collect())
    }

    async fn delete_documents(&self, index: &str, ids: &[String]) -> RagResult<usize> {
        let mut guard = self.indexes.write().await;
        let idx = guard.get_mut(index).ok_or_else(|| missing(index))?;
        for id in ids {
            idx.docs.remove(id);
        }
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FieldFilter, VectorQuery};
    use crate::schema::required_schema;

    fn rec(id: &str, chat: &str, v: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            content: format!("content of {id}"),
            content_vector: v,
            source: "doc.txt".into(),
            chat_id: chat.into(),
        }
    }

    #[tokio::test]
    async fn vector_search_orders_by_similarity_and_filters() {
        let be = MemoryBackend::new();
        be.create_index(&required_schema("idx", 2)).await.unwrap();
        be.upload_documents(
            "idx",
            vec![
                rec("a", "c1", vec![1.0, 0.0]),
                rec("b", "c1", vec![0.7, 0.7]),
                rec("c", "c2", vec![1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

        let req = SearchRequest {
            vector: Some(VectorQuery {
                vector: vec![1.0, 0.1],
                k: 3,
                field: fields::CONTENT_VECTOR.into(),
            }),
            filter: Some(FieldFilter::eq(fields::CHAT_ID, "c1")),
            select: vec![fields::ID.into()],
            top: None,
        };
        let hits = be.search("idx", &req).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(hits[0].len(), 1);
    }

    #[tokio::test]
    async fn wrong_dimension_records_are_rejected_individually() {
        let be = MemoryBackend::new();
        be.create_index(&required_schema("idx", 2)).await.unwrap();
        let res = be
            .upload_documents(
                "idx",
                vec![rec("ok", "c", vec![1.0, 0.0]), rec("bad", "c", vec![1.0])],
            )
            .await
            .unwrap();
        assert!(res[0].succeeded);
        assert!(!res[1].succeeded);
        assert!(res[1].error_message.is_some());
        assert_eq!(be.document_count("idx").await, 1);
    }

    #[tokio::test]
    async fn upload_replaces_by_id() {
        let be = MemoryBackend::new();
        be.create_index(&required_schema("idx", 2)).await.unwrap();
        be.upload_documents("idx", vec![rec("a", "c", vec![1.0, 0.0])])
            .await
            .unwrap();
        be.upload_documents("idx", vec![rec("a", "c", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(be.document_count("idx").await, 1);
    }
}
