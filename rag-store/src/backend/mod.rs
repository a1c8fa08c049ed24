//! Search backend boundary.
//!
//! Everything above this module speaks in indexes, typed fields, chunk
//! records and equality filters; implementations map that onto a concrete
//! store. Two are provided: [`qdrant::QdrantBackend`] for deployments and
//! [`memory::MemoryBackend`] for tests and local runs.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::RagResult;
use crate::naming::escape_filter_value;
use crate::record::ChunkRecord;

/// Kind of a declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact-match string (ids, chat ids, filenames).
    Keyword,
    /// Full-text searchable string.
    Text,
    /// Dense vector; dimensions live in [`VectorFieldSpec`].
    Vector,
}

/// One declared field of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub key: bool,
    pub filterable: bool,
    pub searchable: bool,
    pub retrievable: bool,
}

/// Graph parameters of the approximate nearest-neighbour index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HnswParams {
    pub m: u64,
    pub ef_construction: u64,
    pub ef_search: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 4,
            ef_construction: 400,
            ef_search: 500,
        }
    }
}

/// Vector field configuration. Similarity is always cosine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorFieldSpec {
    pub name: String,
    pub dimensions: usize,
    pub hnsw: HnswParams,
}

/// Declared or observed shape of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub vector: Option<VectorFieldSpec>,
}

impl IndexSchema {
    /// Names of all declared fields, the vector field included.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.vector.iter().map(|v| v.name.as_str()))
    }
}

/// Equality filter `field eq 'value'`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Textual form with single quotes doubled, as logged.
    pub fn expression(&self) -> String {
        format!("{} eq '{}'", self.field, escape_filter_value(&self.value))
    }

    pub fn matches(&self, doc: &SearchDocument) -> bool {
        doc.get(&self.field).and_then(Value::as_str) == Some(self.value.as_str())
    }
}

/// Nearest-neighbour part of a search.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub field: String,
}

/// A search request. Without `vector` every document matching `filter` is
/// listed (up to `top`), which is how match-all searches are expressed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchRequest {
    pub vector: Option<VectorQuery>,
    pub filter: Option<FieldFilter>,
    /// Fields to return; empty means every retrievable field.
    pub select: Vec<String>,
    pub top: Option<usize>,
}

/// Fields of one returned document.
pub type SearchDocument = Map<String, Value>;

/// Per-record result of an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub id: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

/// Operations the store needs from an index backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Observed schema of `name`, or `None` when the index does not exist.
    async fn get_index(&self, name: &str) -> RagResult<Option<IndexSchema>>;

    async fn create_index(&self, schema: &IndexSchema) -> RagResult<()>;

    /// Drops the index together with all its documents.
    async fn delete_index(&self, name: &str) -> RagResult<()>;

    /// Inserts or replaces records by id. Returns one result per record, in order.
    async fn upload_documents(
        &self,
        index: &str,
        records: Vec<ChunkRecord>,
    ) -> RagResult<Vec<UploadResult>>;

    /// With a vector query, results come back best match first.
    async fn search(&self, index: &str, request: &SearchRequest) -> RagResult<Vec<SearchDocument>>;

    /// Deletes documents by key; returns how many were submitted.
    async fn delete_documents(&self, index: &str, ids: &[String]) -> RagResult<usize>;
}

/// Keeps only `select`ed fields (all when `select` is empty).
pub(crate) fn project(doc: SearchDocument, select: &[String]) -> SearchDocument {
    if select.is_empty() {
        return doc;
    }
    doc.into_iter()
        .filter(|(k, _)| select.iter().any(|s| s == k))
        .collect()
}
