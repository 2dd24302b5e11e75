use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DomainError;

pub const MIN_DIMENSION: usize = 2;
pub const MAX_DIMENSION: usize = 16_384;
pub const MIN_M: usize = 4;
pub const MAX_M: usize = 512;
pub const MIN_EF_CONSTRUCTION: usize = 8;
pub const MAX_EF_CONSTRUCTION: usize = 4096;
pub const MAX_TOP_K: usize = 4096;
pub const MAX_EF_SEARCH: usize = 1024;

/// Free-form JSON object used for metadata and filter payloads.
pub type JsonMap = Map<String, Value>;

/// A single filter clause, forwarded verbatim (e.g. `{"category": {"$eq": "docs"}}`).
pub type FilterCondition = JsonMap;

/// Distance metric used by an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    #[default]
    Cosine,
    L2,
    Ip,
}

/// Quantization level Endee stores vectors at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Binary,
    #[default]
    #[serde(alias = "int8")]
    Int8d,
    #[serde(alias = "int16")]
    Int16d,
    Float16,
    Float32,
}

/// Parameters for creating an index. Immutable once sent; Endee owns it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexConfig {
    /// Unique name for the index.
    pub name: String,
    /// Vector dimensionality (2-16384).
    pub dimension: usize,
    /// Distance metric: cosine, l2 or ip.
    #[serde(default)]
    pub space_type: SpaceType,
    /// Quantization level: binary, int8d, int16d, float16 or float32.
    #[serde(default)]
    pub precision: Precision,
    /// Sparse dimensionality, enables hybrid search when set.
    #[serde(default)]
    pub sparse_dimension: Option<usize>,
    /// HNSW connectivity (4-512).
    #[serde(default = "default_m")]
    pub m: usize,
    /// HNSW build quality (8-4096).
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            space_type: SpaceType::default(),
            precision: Precision::default(),
            sparse_dimension: None,
            m: default_m(),
            ef_construction: default_ef_construction(),
        }
    }

    pub fn with_space_type(mut self, space_type: SpaceType) -> Self {
        self.space_type = space_type;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_sparse_dimension(mut self, sparse_dimension: usize) -> Self {
        self.sparse_dimension = Some(sparse_dimension);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_name("index name", &self.name)?;
        check_range("dimension", self.dimension, MIN_DIMENSION, MAX_DIMENSION)?;
        check_range("m", self.m, MIN_M, MAX_M)?;
        check_range(
            "ef_construction",
            self.ef_construction,
            MIN_EF_CONSTRUCTION,
            MAX_EF_CONSTRUCTION,
        )?;
        if self.sparse_dimension == Some(0) {
            return Err(DomainError::validation(
                "sparse_dimension must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Request body expected by `POST /api/v1/index/create`.
    pub fn to_wire(&self) -> Value {
        let mut payload = serde_json::json!({
            "index_name": self.name,
            "dim": self.dimension,
            "space_type": self.space_type,
            "precision": self.precision,
            "M": self.m,
            "ef_con": self.ef_construction,
        });
        if let Some(sparse_dim) = self.sparse_dimension {
            payload["sparse_dim"] = Value::from(sparse_dim);
        }
        payload
    }
}

/// Index description as reported by Endee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexInfo {
    #[serde(alias = "index_name")]
    pub name: String,
    #[serde(default, alias = "dim")]
    pub dimension: usize,
    #[serde(default)]
    pub space_type: String,
    #[serde(default)]
    pub precision: String,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub sparse_dim: usize,
    #[serde(default = "default_m", alias = "M")]
    pub m: usize,
    #[serde(default)]
    pub created_at: i64,
}

/// A vector to upsert with a pre-computed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VectorItem {
    /// Unique identifier within the index.
    pub id: String,
    /// Dense embedding.
    pub vector: Vec<f32>,
    /// Arbitrary metadata returned with search hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonMap>,
    /// Filterable fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonMap>,
    /// Sparse term indices for hybrid indexes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_indices: Option<Vec<u32>>,
    /// Sparse term weights, same length as `sparse_indices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_values: Option<Vec<f32>>,
}

impl VectorItem {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            meta: None,
            filter: None,
            sparse_indices: None,
            sparse_values: None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::validation("vector id cannot be empty"));
        }
        if self.vector.is_empty() {
            return Err(DomainError::validation(format!(
                "vector `{}` has no components",
                self.id
            )));
        }
        match (&self.sparse_indices, &self.sparse_values) {
            (Some(indices), Some(values)) if indices.len() != values.len() => {
                Err(DomainError::validation(format!(
                    "vector `{}` has {} sparse indices but {} sparse values",
                    self.id,
                    indices.len(),
                    values.len()
                )))
            }
            (Some(_), None) | (None, Some(_)) => Err(DomainError::validation(format!(
                "vector `{}` must set sparse_indices and sparse_values together",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

/// A document whose vector is produced by the active embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentItem {
    pub id: String,
    /// Text content to embed.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonMap>,
}

impl DocumentItem {
    pub fn into_vector(self, vector: Vec<f32>) -> VectorItem {
        VectorItem {
            id: self.id,
            vector,
            meta: self.meta,
            filter: self.filter,
            sparse_indices: None,
            sparse_values: None,
        }
    }
}

/// Replacement filter for an existing vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterUpdate {
    pub id: String,
    pub filter: JsonMap,
}

/// Fully-shaped search request handed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub vector: Option<Vec<f32>>,
    pub sparse_indices: Option<Vec<u32>>,
    pub sparse_values: Option<Vec<f32>>,
    pub top_k: usize,
    pub ef: usize,
    pub include_vectors: bool,
    pub filter: Option<Vec<FilterCondition>>,
}

impl SearchQuery {
    pub fn dense(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector: Some(vector),
            sparse_indices: None,
            sparse_values: None,
            top_k,
            ef: default_ef_search(),
            include_vectors: false,
            filter: None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.check_bounds()?;
        self.check_terms()
    }

    /// `top_k` and `ef` limits; independent of the query vector.
    pub fn check_bounds(&self) -> Result<(), DomainError> {
        check_range("top_k", self.top_k, 1, MAX_TOP_K)?;
        check_range("ef", self.ef, 1, MAX_EF_SEARCH)
    }

    /// At least one of the dense vector or the sparse terms must be present.
    pub fn check_terms(&self) -> Result<(), DomainError> {
        let has_dense = self.vector.as_ref().is_some_and(|v| !v.is_empty());
        let has_sparse = self.sparse_indices.as_ref().is_some_and(|v| !v.is_empty());
        if !has_dense && !has_sparse {
            return Err(DomainError::validation(
                "search requires a dense vector or sparse terms",
            ));
        }
        Ok(())
    }

    /// Request body expected by `POST /api/v1/index/{name}/search`.
    pub fn to_wire(&self) -> Result<Value, DomainError> {
        let mut payload = serde_json::json!({
            "k": self.top_k,
            "ef": self.ef,
            "include_vectors": self.include_vectors,
        });
        if let Some(vector) = self.vector.as_ref().filter(|v| !v.is_empty()) {
            payload["vector"] = serde_json::json!(vector);
        }
        if let (Some(indices), Some(values)) = (&self.sparse_indices, &self.sparse_values) {
            if !indices.is_empty() {
                payload["sparse_indices"] = serde_json::json!(indices);
                payload["sparse_values"] = serde_json::json!(values);
            }
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            // Endee expects the filter array as a JSON-encoded string.
            let encoded = serde_json::to_string(filter)
                .map_err(|err| DomainError::other(format!("failed to encode filter: {err}")))?;
            payload["filter"] = Value::String(encoded);
        }
        Ok(payload)
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub id: String,
    pub similarity: f32,
    #[serde(default)]
    pub distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Backup entry as listed by Endee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BackupInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
}

impl BackupInfo {
    /// Endee lists backups either as bare names or as objects.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::String(name) => Ok(Self {
                name,
                timestamp: None,
                size_mb: None,
            }),
            other => serde_json::from_value(other)
                .map_err(|err| DomainError::decode(format!("invalid backup entry: {err}"))),
        }
    }
}

/// Acknowledgement returned by write operations whose response is plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub fn require_name(label: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{label} cannot be empty")));
    }
    Ok(())
}

pub fn check_range(label: &str, value: usize, min: usize, max: usize) -> Result<(), DomainError> {
    if value < min || value > max {
        return Err(DomainError::validation(format!(
            "{label} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

pub const fn default_m() -> usize {
    16
}

pub const fn default_ef_construction() -> usize {
    128
}

pub const fn default_ef_search() -> usize {
    128
}

pub const fn default_top_k() -> usize {
    10
}
