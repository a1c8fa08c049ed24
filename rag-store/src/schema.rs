//! Index schema management: create missing indexes, detect drift, repair.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{FieldKind, FieldSpec, HnswParams, IndexSchema, SearchBackend, VectorFieldSpec};
use crate::config::DriftPolicy;
use crate::errors::{RagError, RagResult};
use crate::record::fields;

fn field(name: &str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name: name.to_string(),
        kind,
        key: false,
        filterable: false,
        searchable: false,
        retrievable: true,
    }
}

/// The schema every chat index must carry.
pub fn required_schema(index_name: &str, vector_dimensions: usize) -> IndexSchema {
    IndexSchema {
        name: index_name.to_string(),
        fields: vec![
            FieldSpec {
                key: true,
                filterable: true,
                ..field(fields::ID, FieldKind::Keyword)
            },
            FieldSpec {
                filterable: true,
                ..field(fields::CHAT_ID, FieldKind::Keyword)
            },
            FieldSpec {
                searchable: true,
                ..field(fields::CONTENT, FieldKind::Text)
            },
            FieldSpec {
                filterable: true,
                ..field(fields::SOURCE, FieldKind::Keyword)
            },
        ],
        vector: Some(VectorFieldSpec {
            name: fields::CONTENT_VECTOR.to_string(),
            dimensions: vector_dimensions,
            hnsw: HnswParams::default(),
        }),
    }
}

/// Why an existing index no longer matches the required schema.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Required field names absent from the index, sorted.
    pub missing_fields: Vec<String>,
    /// `(existing, expected)` when the vector field is absent or sized differently.
    pub dimension_mismatch: Option<(Option<usize>, usize)>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty() && self.dimension_mismatch.is_none()
    }

    pub fn reasons(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing_fields.is_empty() {
            parts.push(format!(
                "missing fields {{{}}}",
                self.missing_fields.join(", ")
            ));
        }
        if let Some((existing, expected)) = self.dimension_mismatch {
            let existing = existing.map_or_else(|| "none".to_string(), |d| d.to_string());
            parts.push(format!(
                "vector dimension mismatch (existing={existing}, expected={expected})"
            ));
        }
        parts.join("; ")
    }
}

/// Compares an observed schema with the required one.
pub fn detect_drift(existing: &IndexSchema, required: &IndexSchema) -> DriftReport {
    let present: Vec<&str> = existing.field_names().collect();
    let mut missing_fields: Vec<String> = required
        .field_names()
        .filter(|name| !present.contains(name))
        .map(str::to_string)
        .collect();
    missing_fields.sort();

    let dimension_mismatch = required.vector.as_ref().and_then(|want| {
        let have = existing
            .vector
            .as_ref()
            .filter(|v| v.name == want.name)
            .map(|v| v.dimensions);
        (have != Some(want.dimensions)).then_some((have, want.dimensions))
    });

    DriftReport {
        missing_fields,
        dimension_mismatch,
    }
}

/// Creates indexes on demand and keeps their schema in line.
#[derive(Clone)]
pub struct SchemaManager {
    backend: Arc<dyn SearchBackend>,
    policy: DriftPolicy,
}

impl SchemaManager {
    pub fn new(backend: Arc<dyn SearchBackend>, policy: DriftPolicy) -> Self {
        Self { backend, policy }
    }

    /// Idempotently makes `index_name` exist with the required schema.
    ///
    /// Under [`DriftPolicy::Recreate`] a drifted index is deleted and rebuilt,
    /// losing every document it held.
    pub async fn ensure_index(&self, index_name: &str, vector_dimensions: usize) -> RagResult<()> {
        let required = required_schema(index_name, vector_dimensions);

        let Some(existing) = self.backend.get_index(index_name).await? else {
            self.backend.create_index(&required).await?;
            info!(index = index_name, dims = vector_dimensions, "created search index");
            return Ok(());
        };

        let drift = detect_drift(&existing, &required);
        if drift.is_clean() {
            info!(index = index_name, "search index schema up to date");
            return Ok(());
        }

        let reason = drift.reasons();
        match self.policy {
            DriftPolicy::Fail => {
                warn!(index = index_name, %reason, "index drift detected; leaving index untouched");
                Err(RagError::SchemaDrift {
                    index: index_name.to_string(),
                    reason,
                })
            }
            DriftPolicy::Recreate => {
                warn!(index = index_name, %reason, "index drift detected; recreating index");
                self.backend.delete_index(index_name).await?;
                self.backend.create_index(&required).await?;
                info!(index = index_name, dims = vector_dimensions, "recreated search index");
                Ok(())
            }
        }
    }
}
