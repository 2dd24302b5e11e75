use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    models::{default_ef_search, default_top_k},
    BackupInfo, DocumentItem, FilterCondition, FilterUpdate, IndexConfig, IndexInfo,
    SearchResult, VectorItem,
};

/// Parameters for `endee_create_index`.
pub type CreateIndexRequest = IndexConfig;

/// Identifies an index by name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexNameRequest {
    /// Name of the index.
    pub name: String,
}

/// Deletes an index and all of its vectors.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteIndexRequest {
    /// Name of the index to delete.
    pub name: String,
    /// Must be true, otherwise the call is rejected.
    #[serde(default)]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpsertVectorsRequest {
    /// Target index name.
    pub index_name: String,
    /// Vectors with id, vector and optional meta/filter/sparse fields.
    pub vectors: Vec<VectorItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpsertDocumentsRequest {
    /// Target index name.
    pub index_name: String,
    /// Documents with id, text and optional meta/filter.
    pub documents: Vec<DocumentItem>,
    /// When set, also attach hashed term-frequency sparse vectors of this dimensionality.
    #[serde(default)]
    pub sparse_dimension: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetVectorRequest {
    pub index_name: String,
    pub vector_id: String,
    /// Keep the raw vector components in the reply.
    #[serde(default)]
    pub include_vector: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteVectorRequest {
    pub index_name: String,
    pub vector_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteByFilterRequest {
    pub index_name: String,
    /// Filter conditions, e.g. `[{"category": {"$eq": "obsolete"}}]`.
    pub filter: Vec<FilterCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateFiltersRequest {
    pub index_name: String,
    /// Replacement filters, e.g. `[{"id": "doc1", "filter": {"category": "updated"}}]`.
    pub updates: Vec<FilterUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VectorSearchRequest {
    pub index_name: String,
    /// Query vector.
    pub vector: Vec<f32>,
    /// Number of results (1-4096).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filter: Option<Vec<FilterCondition>>,
    /// Search quality (1-1024).
    #[serde(default = "default_ef_search")]
    pub ef: usize,
    #[serde(default)]
    pub include_vectors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TextSearchRequest {
    pub index_name: String,
    /// Natural-language query, embedded with the active provider.
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filter: Option<Vec<FilterCondition>>,
    #[serde(default = "default_ef_search")]
    pub ef: usize,
    #[serde(default)]
    pub include_vectors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HybridSearchRequest {
    /// Name of an index created with a sparse dimension.
    pub index_name: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filter: Option<Vec<FilterCondition>>,
    #[serde(default = "default_ef_search")]
    pub ef: usize,
    /// Weight reported for the dense component (0.0-1.0).
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,
    /// Sparse dimensionality; looked up from the index when omitted.
    #[serde(default)]
    pub sparse_dimension: Option<usize>,
}

/// Shared options for JSON/JSONL and CSV imports.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportJsonRequest {
    pub index_name: String,
    /// Path to a `.json` array or `.jsonl` file.
    pub file_path: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Field with text to embed (ignored when `vector_field` is set).
    #[serde(default)]
    pub text_field: Option<String>,
    /// Field with a pre-computed vector.
    #[serde(default)]
    pub vector_field: Option<String>,
    #[serde(default)]
    pub meta_fields: Vec<String>,
    #[serde(default)]
    pub filter_fields: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportCsvRequest {
    pub index_name: String,
    pub file_path: String,
    #[serde(default = "default_id_field")]
    pub id_column: String,
    #[serde(default)]
    pub text_column: Option<String>,
    /// Column holding a JSON-encoded vector such as `[0.1, 0.2]`.
    #[serde(default)]
    pub vector_column: Option<String>,
    #[serde(default)]
    pub meta_columns: Vec<String>,
    #[serde(default)]
    pub filter_columns: Vec<String>,
    /// Single-character delimiter; `\t` selects tab.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateBackupRequest {
    pub index_name: String,
    pub backup_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RestoreBackupRequest {
    pub backup_name: String,
    /// Name of the index to restore into.
    pub target_index_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteBackupRequest {
    pub backup_name: String,
    /// Must be true, otherwise the call is rejected.
    #[serde(default)]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexListResponse {
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpsertResponse {
    pub success: bool,
    pub upserted_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetVectorResponse {
    pub found: bool,
    pub vector: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteByFilterResponse {
    pub success: bool,
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_embedding_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_weight: Option<f32>,
}

impl SearchResponse {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            total_results: results.len(),
            results,
            query_embedding_provider: None,
            search_type: None,
            dense_weight: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImportReport {
    pub success: bool,
    pub total_imported: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackupListResponse {
    pub backups: Vec<BackupInfo>,
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthStatusResponse {
    pub status: String,
    pub endee_url: String,
    pub timestamp: i64,
    pub embedding_provider: String,
    pub local_model_loaded: bool,
}

/// Sanitized configuration view; never includes secrets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigResponse {
    pub endee_url: String,
    pub endee_auth_enabled: bool,
    pub embedding_provider: String,
    pub embedding_provider_actual: String,
    pub openai_model: String,
    pub local_model: String,
    pub embedding_dimension: Option<usize>,
    pub openai_key_configured: bool,
    pub mcp_transport: String,
    pub mcp_sse_port: u16,
}

const fn default_dense_weight() -> f32 {
    0.7
}

const fn default_batch_size() -> usize {
    100
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_request_defaults() {
        let request: ImportJsonRequest = serde_json::from_value(serde_json::json!({
            "index_name": "docs",
            "file_path": "/tmp/records.jsonl",
            "text_field": "body"
        }))
        .unwrap();
        assert_eq!(request.id_field, "id");
        assert_eq!(request.batch_size, 100);
        assert!(request.meta_fields.is_empty());
        assert_eq!(request.vector_field, None);

        let request: ImportCsvRequest = serde_json::from_value(serde_json::json!({
            "index_name": "docs",
            "file_path": "/tmp/records.csv"
        }))
        .unwrap();
        assert_eq!(request.delimiter, ",");
        assert_eq!(request.id_column, "id");
    }

    #[test]
    fn test_search_request_defaults() {
        let request: HybridSearchRequest = serde_json::from_value(serde_json::json!({
            "index_name": "docs",
            "query": "rust vector search"
        }))
        .unwrap();
        assert_eq!(request.top_k, 10);
        assert_eq!(request.ef, 128);
        assert!((request.dense_weight - 0.7).abs() < f32::EPSILON);
        assert_eq!(request.sparse_dimension, None);
    }

    #[test]
    fn test_search_response_omits_unset_extras() {
        let value = serde_json::to_value(SearchResponse::new(Vec::new())).unwrap();
        assert_eq!(value, serde_json::json!({ "results": [], "total_results": 0 }));
    }
}
