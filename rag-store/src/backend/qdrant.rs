//! Qdrant-backed [`SearchBackend`].
//!
//! An index is a collection. Declared fields become payload indexes and the
//! vector field becomes a named cosine vector; the observed schema is read
//! back from the collection's payload schema and vector params. Point ids are
//! UUIDv5 of the chunk id, which is also stored in the `id` payload field.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{Payload, Qdrant};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, HnswConfigDiffBuilder, PayloadSchemaType, PointId,
    PointStruct, PointsIdsList, ScrollPointsBuilder, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParams, VectorParamsBuilder, VectorsConfigBuilder,
    vectors_config::Config as VectorsConfigKind,
};
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    FieldFilter, FieldKind, FieldSpec, HnswParams, IndexSchema, SearchBackend, SearchDocument,
    SearchRequest, UploadResult, VectorFieldSpec, project,
};
use crate::config::QdrantSettings;
use crate::errors::{RagError, RagResult};
use crate::record::{ChunkRecord, fields};

/// [`SearchBackend`] over a Qdrant instance.
pub struct QdrantBackend {
    client: Qdrant,
    page_size: usize,
}

impl QdrantBackend {
    /// Connects lazily; the first request reveals connectivity problems.
    pub fn new(settings: &QdrantSettings, page_size: usize) -> RagResult<Self> {
        let mut builder = Qdrant::from_url(&settings.url);
        if let Some(key) = &settings.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build()?;
        info!(url = %settings.url, "qdrant client configured");
        Ok(Self {
            client,
            page_size: page_size.max(1),
        })
    }

    /// Lists documents without a vector query, following scroll pages.
    async fn scroll_all(
        &self,
        index: &str,
        filter: Option<&FieldFilter>,
        top: Option<usize>,
    ) -> RagResult<Vec<SearchDocument>> {
        let mut out = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let remaining = top.map(|t| t.saturating_sub(out.len()));
            if remaining == Some(0) {
                break;
            }
            let limit = remaining.unwrap_or(self.page_size).min(self.page_size);

            let mut req = ScrollPointsBuilder::new(index)
                .limit(limit as u32)
                .with_payload(true)
                .with_vectors(false);
            if let Some(f) = filter {
                req = req.filter(to_qdrant_filter(f));
            }
            if let Some(o) = offset.take() {
                req = req.offset(o);
            }

            let page = self.client.scroll(req).await?;
            out.extend(page.result.into_iter().map(|p| qpayload_to_json(p.payload)));

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(index, returned = out.len(), "scroll completed");
        Ok(out)
    }
}

/// Stable point id for a chunk id.
pub fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes()).to_string()
}

fn to_qdrant_filter(f: &FieldFilter) -> Filter {
    Filter::must([Condition::matches(f.field.clone(), f.value.clone())])
}

fn field_type(kind: FieldKind) -> Option<FieldType> {
    match kind {
        FieldKind::Keyword => Some(FieldType::Keyword),
        FieldKind::Text => Some(FieldType::Text),
        FieldKind::Vector => None,
    }
}

fn payload_json(rec: &ChunkRecord) -> Value {
    json!({
        fields::ID: rec.id,
        fields::CHAT_ID: rec.chat_id,
        fields::CONTENT: rec.content,
        fields::SOURCE: rec.source,
    })
}

fn to_payload(rec: &ChunkRecord) -> RagResult<Payload> {
    Payload::try_from(payload_json(rec)).map_err(|e| RagError::Backend(e.to_string()))
}

#[async_trait]
impl SearchBackend for QdrantBackend {
    async fn get_index(&self, name: &str) -> RagResult<Option<IndexSchema>> {
        if !self.client.collection_exists(name).await? {
            return Ok(None);
        }
        let info = self
            .client
            .collection_info(name)
            .await?
            .result
            .ok_or_else(|| RagError::Backend(format!("collection '{name}' returned no info")))?;

        let fields = info
            .payload_schema
            .iter()
            .map(|(field_name, schema)| {
                let kind = match PayloadSchemaType::try_from(schema.data_type) {
                    Ok(PayloadSchemaType::Text) => FieldKind::Text,
                    _ => FieldKind::Keyword,
                };
                FieldSpec {
                    name: field_name.clone(),
                    kind,
                    key: field_name == fields::ID,
                    filterable: kind == FieldKind::Keyword,
                    searchable: kind == FieldKind::Text,
                    retrievable: true,
                }
            })
            .collect();

        let vector = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|cfg| match cfg {
                VectorsConfigKind::ParamsMap(map) => named_content_vector(map.map),
                // An unnamed vector never satisfies the named field.
                VectorsConfigKind::Params(_) => None,
            });

        Ok(Some(IndexSchema {
            name: name.to_string(),
            fields,
            vector,
        }))
    }

    async fn create_index(&self, schema: &IndexSchema) -> RagResult<()> {
        let mut vectors = VectorsConfigBuilder::default();
        if let Some(v) = &schema.vector {
            vectors.add_named_vector_params(
                v.name.clone(),
                VectorParamsBuilder::new(v.dimensions as u64, Distance::Cosine).hnsw_config(
                    HnswConfigDiffBuilder::default()
                        .m(v.hnsw.m)
                        .ef_construct(v.hnsw.ef_construction),
                ),
            );
        }

        self.client
            .create_collection(CreateCollectionBuilder::new(&schema.name).vectors_config(vectors))
            .await?;

        for f in &schema.fields {
            if !(f.filterable || f.searchable || f.key) {
                continue;
            }
            let Some(ft) = field_type(f.kind) else {
                continue;
            };
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&schema.name, &f.name, ft).wait(true),
                )
                .await?;
        }

        info!(collection = %schema.name, fields = schema.fields.len(), "collection created");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> RagResult<()> {
        self.client.delete_collection(name).await?;
        info!(collection = name, "collection deleted");
        Ok(())
    }

    async fn upload_documents(
        &self,
        index: &str,
        records: Vec<ChunkRecord>,
    ) -> RagResult<Vec<UploadResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut points = Vec::with_capacity(records.len());
        for rec in &records {
            let vectors: HashMap<String, Vec<f32>> = HashMap::from([(
                fields::CONTENT_VECTOR.to_string(),
                rec.content_vector.clone(),
            )]);
            points.push(PointStruct::new(point_id(&rec.id), vectors, to_payload(rec)?));
        }

        debug!(collection = index, points = points.len(), "upserting points");

        // Qdrant accepts or rejects a batch as a whole.
        let outcome = self
            .client
            .upsert_points(UpsertPointsBuilder::new(index, points).wait(true))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());

        Ok(records
            .into_iter()
            .map(|rec| UploadResult {
                id: rec.id,
                succeeded: outcome.is_ok(),
                error_message: outcome.as_ref().err().cloned(),
            })
            .collect())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> RagResult<Vec<SearchDocument>> {
        let Some(q) = &request.vector else {
            let docs = self
                .scroll_all(index, request.filter.as_ref(), request.top)
                .await?;
            return Ok(docs
                .into_iter()
                .map(|d| project(d, &request.select))
                .collect());
        };

        let limit = request.top.map_or(q.k, |t| t.min(q.k));
        let mut builder = SearchPointsBuilder::new(index, q.vector.clone(), limit as u64)
            .vector_name(q.field.clone())
            .with_payload(true)
            .params(SearchParamsBuilder::default().hnsw_ef(HnswParams::default().ef_search));
        if let Some(f) = &request.filter {
            builder = builder.filter(to_qdrant_filter(f));
        }

        let res = self.client.search_points(builder).await?;
        debug!(collection = index, hits = res.result.len(), "search completed");

        Ok(res
            .result
            .into_iter()
            .map(|p| project(qpayload_to_json(p.payload), &request.select))
            .collect())
    }

    async fn delete_documents(&self, index: &str, ids: &[String]) -> RagResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(point_id(id))).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(index)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await?;
        Ok(ids.len())
    }
}

/// Picks the `content_vector` entry out of a named-vector map.
fn named_content_vector(map: HashMap<String, VectorParams>) -> Option<VectorFieldSpec> {
    map.into_iter()
        .find(|(name, _)| name == fields::CONTENT_VECTOR)
        .map(|(name, params)| VectorFieldSpec {
            name,
            dimensions: params.size as usize,
            hnsw: HnswParams::default(),
        })
}

/// Converts a Qdrant payload into a JSON object.
///
/// Nested structs and lists are not produced by this crate and map to `Null`.
fn qpayload_to_json(payload: HashMap<String, QValue>) -> SearchDocument {
    use qdrant_client::qdrant::value::Kind as K;
    payload
        .into_iter()
        .map(|(k, v)| {
            let j = match v.kind {
                Some(K::StringValue(s)) => Value::String(s),
                Some(K::IntegerValue(i)) => Value::Number(i.into()),
                Some(K::DoubleValue(f)) => json!(f),
                Some(K::BoolValue(b)) => Value::Bool(b),
                _ => Value::Null,
            };
            (k, j)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_uuids() {
        let a = point_id("chat_report_0");
        assert_eq!(a, point_id("chat_report_0"));
        assert_ne!(a, point_id("chat_report_1"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn payload_conversion_keeps_scalars() {
        let mut p = HashMap::new();
        p.insert("content".to_string(), QValue::from("text".to_string()));
        p.insert("n".to_string(), QValue::from(3_i64));
        let doc = qpayload_to_json(p);
        assert_eq!(doc["content"], json!("text"));
        assert_eq!(doc["n"], json!(3));
    }

    #[test]
    fn payload_carries_all_retrievable_fields() {
        let rec = ChunkRecord {
            id: "c_x_0".into(),
            content: "body".into(),
            content_vector: vec![0.1, 0.2],
            source: "x.txt".into(),
            chat_id: "c".into(),
        };
        let value = payload_json(&rec);
        for key in [fields::ID, fields::CHAT_ID, fields::CONTENT, fields::SOURCE] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value.get(fields::CONTENT_VECTOR).is_none());
        assert!(to_payload(&rec).is_ok());
    }

    #[test]
    fn only_the_named_content_vector_is_reported() {
        let params = VectorParams {
            size: 1536,
            ..Default::default()
        };
        let other = HashMap::from([("other".to_string(), params.clone())]);
        assert!(named_content_vector(other).is_none());

        let ours = HashMap::from([(fields::CONTENT_VECTOR.to_string(), params)]);
        assert_eq!(named_content_vector(ours).map(|v| v.dimensions), Some(1536));
    }
}
