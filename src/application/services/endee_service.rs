use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    application::dtos::{
        BackupListResponse, ConfigResponse, CreateBackupRequest, CreateIndexRequest,
        DeleteBackupRequest, DeleteByFilterRequest, DeleteByFilterResponse, DeleteIndexRequest,
        DeleteVectorRequest, GetVectorRequest, GetVectorResponse, HealthStatusResponse,
        HybridSearchRequest, ImportCsvRequest, ImportJsonRequest, ImportReport,
        IndexListResponse, IndexNameRequest, RestoreBackupRequest, SearchResponse,
        TextSearchRequest, UpdateFiltersRequest, UpsertDocumentsRequest, UpsertResponse,
        UpsertVectorsRequest, VectorSearchRequest,
    },
    domain::{
        models::{check_range, require_name},
        BackupInfo, DomainError, FilterCondition, FilterUpdate, IndexConfig, IndexInfo,
        OperationResult, SearchQuery, SearchResult, VectorItem,
    },
    settings::{ProviderKind, Settings},
};

use super::{
    import_service::{read_csv_records, read_json_records, BatchImporter, FieldMapping},
    sparse::encode_sparse,
};

/// Capability shared by every embedding backend (disabled, OpenAI, local model).
pub trait EmbeddingProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed every text or fail as a whole; partial results are never returned.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embed_texts(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::embedding(format!("{} returned no embedding", self.provider_name()))
            })
    }

    fn is_model_loaded(&self) -> bool {
        false
    }

    /// Load any lazily initialised model ahead of the first request.
    fn warm_up(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Hands out the process-wide embedding provider.
pub trait ProviderSource: Send + Sync {
    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>, DomainError>;

    /// Which provider `provider()` builds, without building it.
    fn resolved_kind(&self) -> ProviderKind;

    fn is_local_model_loaded(&self) -> bool;
}

/// Contract for the remote Endee vector database.
pub trait VectorDatabase: Send + Sync {
    fn health(&self) -> Result<Value, DomainError>;

    fn stats(&self) -> Result<Value, DomainError>;

    fn create_index(&self, config: &IndexConfig) -> Result<OperationResult, DomainError>;

    fn list_indexes(&self) -> Result<Vec<IndexInfo>, DomainError>;

    fn describe_index(&self, name: &str) -> Result<Value, DomainError>;

    fn delete_index(&self, name: &str) -> Result<OperationResult, DomainError>;

    fn upsert_vectors(&self, index: &str, vectors: &[VectorItem]) -> Result<(), DomainError>;

    /// `Ok(None)` when the id does not exist.
    fn get_vector(&self, index: &str, id: &str) -> Result<Option<Value>, DomainError>;

    fn delete_vector(&self, index: &str, id: &str) -> Result<OperationResult, DomainError>;

    fn delete_by_filter(&self, index: &str, filter: &[FilterCondition])
        -> Result<u64, DomainError>;

    fn update_filters(
        &self,
        index: &str,
        updates: &[FilterUpdate],
    ) -> Result<OperationResult, DomainError>;

    fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError>;

    fn create_backup(&self, index: &str, backup: &str) -> Result<OperationResult, DomainError>;

    fn list_backups(&self) -> Result<Vec<BackupInfo>, DomainError>;

    fn restore_backup(
        &self,
        backup: &str,
        target_index: &str,
    ) -> Result<OperationResult, DomainError>;

    fn delete_backup(&self, backup: &str) -> Result<OperationResult, DomainError>;
}

/// Tool-facing orchestrator: validates requests, embeds text when needed and
/// delegates to the remote database.
pub struct EndeeService {
    database: Arc<dyn VectorDatabase>,
    embeddings: Arc<dyn ProviderSource>,
    importer: BatchImporter,
    settings: Arc<Settings>,
}

impl EndeeService {
    pub fn new(
        database: Arc<dyn VectorDatabase>,
        embeddings: Arc<dyn ProviderSource>,
        settings: Arc<Settings>,
    ) -> Self {
        let importer = BatchImporter::new(Arc::clone(&database), Arc::clone(&embeddings));
        Self {
            database,
            embeddings,
            importer,
            settings,
        }
    }

    pub fn create_index(&self, request: CreateIndexRequest) -> Result<OperationResult, DomainError> {
        request.validate()?;
        let result = self.database.create_index(&request)?;
        info!(
            target: "endee_mcp::service",
            index = %request.name,
            dimension = request.dimension,
            "index created"
        );
        Ok(result)
    }

    pub fn list_indexes(&self) -> Result<IndexListResponse, DomainError> {
        Ok(IndexListResponse {
            indexes: self.database.list_indexes()?,
        })
    }

    pub fn describe_index(&self, request: IndexNameRequest) -> Result<Value, DomainError> {
        require_name("index name", &request.name)?;
        self.database.describe_index(&request.name)
    }

    pub fn delete_index(&self, request: DeleteIndexRequest) -> Result<OperationResult, DomainError> {
        require_name("index name", &request.name)?;
        if request.confirm != Some(true) {
            return Err(DomainError::confirmation(format!(
                "set confirm=true to delete index `{}`",
                request.name
            )));
        }
        let result = self.database.delete_index(&request.name)?;
        warn!(target: "endee_mcp::service", index = %request.name, "index deleted");
        Ok(result)
    }

    pub fn upsert_vectors(&self, request: UpsertVectorsRequest) -> Result<UpsertResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.vectors.is_empty() {
            return Err(DomainError::validation("vectors cannot be empty"));
        }
        for item in &request.vectors {
            item.validate()?;
        }

        self.database
            .upsert_vectors(&request.index_name, &request.vectors)?;

        Ok(UpsertResponse {
            success: true,
            upserted_count: request.vectors.len(),
            embedding_provider: None,
            embedding_model: None,
        })
    }

    pub fn upsert_documents(
        &self,
        request: UpsertDocumentsRequest,
    ) -> Result<UpsertResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.documents.is_empty() {
            return Err(DomainError::validation("documents cannot be empty"));
        }
        for document in &request.documents {
            require_name("document id", &document.id)?;
            if document.text.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "document `{}` has empty text",
                    document.id
                )));
            }
        }
        if let Some(dimension) = request.sparse_dimension {
            check_range("sparse_dimension", dimension, 1, u32::MAX as usize)?;
        }

        let provider = self.embeddings.provider()?;
        let texts: Vec<String> = request.documents.iter().map(|d| d.text.clone()).collect();
        let vectors = provider.embed_texts(&texts)?;
        if vectors.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "{} returned {} embeddings for {} documents",
                provider.provider_name(),
                vectors.len(),
                texts.len()
            )));
        }

        let items: Vec<VectorItem> = request
            .documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| {
                let sparse = request
                    .sparse_dimension
                    .map(|dimension| encode_sparse(&document.text, dimension));
                let mut item = document.into_vector(vector);
                if let Some((indices, values)) = sparse.filter(|(indices, _)| !indices.is_empty()) {
                    item.sparse_indices = Some(indices);
                    item.sparse_values = Some(values);
                }
                item
            })
            .collect();

        self.database.upsert_vectors(&request.index_name, &items)?;
        debug!(
            target: "endee_mcp::service",
            index = %request.index_name,
            count = items.len(),
            provider = provider.provider_name(),
            "documents embedded and upserted"
        );

        Ok(UpsertResponse {
            success: true,
            upserted_count: items.len(),
            embedding_provider: Some(provider.provider_name().to_string()),
            embedding_model: Some(provider.model_name().to_string()),
        })
    }

    pub fn get_vector(&self, request: GetVectorRequest) -> Result<GetVectorResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        require_name("vector id", &request.vector_id)?;

        let found = self
            .database
            .get_vector(&request.index_name, &request.vector_id)?;

        let vector = found.map(|mut value| {
            if !request.include_vector {
                if let Some(object) = value.as_object_mut() {
                    object.remove("vector");
                }
            }
            value
        });

        Ok(GetVectorResponse {
            found: vector.is_some(),
            vector,
        })
    }

    pub fn delete_vector(&self, request: DeleteVectorRequest) -> Result<OperationResult, DomainError> {
        require_name("index name", &request.index_name)?;
        require_name("vector id", &request.vector_id)?;
        self.database
            .delete_vector(&request.index_name, &request.vector_id)
    }

    pub fn delete_by_filter(
        &self,
        request: DeleteByFilterRequest,
    ) -> Result<DeleteByFilterResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.filter.is_empty() || request.filter.iter().any(|c| c.is_empty()) {
            return Err(DomainError::validation(
                "filter must contain at least one non-empty condition",
            ));
        }
        let deleted_count = self
            .database
            .delete_by_filter(&request.index_name, &request.filter)?;
        Ok(DeleteByFilterResponse {
            success: true,
            deleted_count,
        })
    }

    pub fn update_filters(&self, request: UpdateFiltersRequest) -> Result<OperationResult, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.updates.is_empty() {
            return Err(DomainError::validation("updates cannot be empty"));
        }
        for update in &request.updates {
            require_name("vector id", &update.id)?;
        }
        self.database
            .update_filters(&request.index_name, &request.updates)
    }

    pub fn search(&self, request: VectorSearchRequest) -> Result<SearchResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        let query = SearchQuery {
            vector: Some(request.vector),
            sparse_indices: None,
            sparse_values: None,
            top_k: request.top_k,
            ef: request.ef,
            include_vectors: request.include_vectors,
            filter: request.filter,
        };
        query.validate()?;

        let results = self.database.search(&request.index_name, &query)?;
        Ok(SearchResponse::new(results))
    }

    pub fn search_text(&self, request: TextSearchRequest) -> Result<SearchResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.query.trim().is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }
        let mut query = SearchQuery {
            vector: None,
            sparse_indices: None,
            sparse_values: None,
            top_k: request.top_k,
            ef: request.ef,
            include_vectors: request.include_vectors,
            filter: request.filter,
        };
        // rejected before the embedding round-trip
        query.check_bounds()?;

        let provider = self.embeddings.provider()?;
        query.vector = Some(provider.embed_query(request.query.trim())?);
        query.check_terms()?;

        let results = self.database.search(&request.index_name, &query)?;
        let mut response = SearchResponse::new(results);
        response.query_embedding_provider = Some(provider.provider_name().to_string());
        Ok(response)
    }

    pub fn hybrid_search(&self, request: HybridSearchRequest) -> Result<SearchResponse, DomainError> {
        require_name("index name", &request.index_name)?;
        if request.query.trim().is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }
        if !(0.0..=1.0).contains(&request.dense_weight) {
            return Err(DomainError::validation(format!(
                "dense_weight must be between 0.0 and 1.0, got {}",
                request.dense_weight
            )));
        }
        let mut query = SearchQuery {
            vector: None,
            sparse_indices: None,
            sparse_values: None,
            top_k: request.top_k,
            ef: request.ef,
            include_vectors: false,
            filter: request.filter,
        };
        query.check_bounds()?;

        let sparse_dimension =
            self.resolve_sparse_dimension(&request.index_name, request.sparse_dimension)?;
        let (indices, values) = encode_sparse(&request.query, sparse_dimension);
        if indices.is_empty() {
            return Err(DomainError::validation("query has no searchable terms"));
        }
        query.sparse_indices = Some(indices);
        query.sparse_values = Some(values);

        let provider = self.embeddings.provider()?;
        query.vector = Some(provider.embed_query(request.query.trim())?);
        query.check_terms()?;

        let results = self.database.search(&request.index_name, &query)?;
        let mut response = SearchResponse::new(results);
        response.query_embedding_provider = Some(provider.provider_name().to_string());
        response.search_type = Some("hybrid".into());
        response.dense_weight = Some(request.dense_weight);
        Ok(response)
    }

    fn resolve_sparse_dimension(
        &self,
        index_name: &str,
        requested: Option<usize>,
    ) -> Result<usize, DomainError> {
        if let Some(dimension) = requested {
            check_range("sparse_dimension", dimension, 1, u32::MAX as usize)?;
            return Ok(dimension);
        }

        let info = self.database.describe_index(index_name)?;
        let reported = ["sparse_dim", "sparse_dimension"]
            .iter()
            .find_map(|key| info.get(*key).and_then(Value::as_u64))
            .unwrap_or(0);
        if reported == 0 {
            return Err(DomainError::validation(format!(
                "index `{index_name}` has no sparse dimension; hybrid search needs an index created with sparse_dimension"
            )));
        }
        usize::try_from(reported)
            .map_err(|_| DomainError::decode(format!("sparse_dim {reported} out of range")))
    }

    pub fn import_json(&self, request: ImportJsonRequest) -> Result<ImportReport, DomainError> {
        require_name("index name", &request.index_name)?;
        let mapping = FieldMapping::new(
            request.id_field,
            request.text_field,
            request.vector_field,
            request.meta_fields,
            request.filter_fields,
        )?;
        let records = read_json_records(&request.file_path)?;
        self.importer
            .import(&request.index_name, records, &mapping, request.batch_size)
    }

    pub fn import_csv(&self, request: ImportCsvRequest) -> Result<ImportReport, DomainError> {
        require_name("index name", &request.index_name)?;
        let mapping = FieldMapping::new(
            request.id_column,
            request.text_column,
            request.vector_column,
            request.meta_columns,
            request.filter_columns,
        )?;
        let records = read_csv_records(&request.file_path, &request.delimiter)?;
        self.importer
            .import(&request.index_name, records, &mapping, request.batch_size)
    }

    pub fn create_backup(&self, request: CreateBackupRequest) -> Result<OperationResult, DomainError> {
        require_name("index name", &request.index_name)?;
        require_name("backup name", &request.backup_name)?;
        self.database
            .create_backup(&request.index_name, &request.backup_name)
    }

    pub fn list_backups(&self) -> Result<BackupListResponse, DomainError> {
        Ok(BackupListResponse {
            backups: self.database.list_backups()?,
        })
    }

    pub fn restore_backup(&self, request: RestoreBackupRequest) -> Result<OperationResult, DomainError> {
        require_name("backup name", &request.backup_name)?;
        require_name("target index name", &request.target_index_name)?;
        self.database
            .restore_backup(&request.backup_name, &request.target_index_name)
    }

    pub fn delete_backup(&self, request: DeleteBackupRequest) -> Result<OperationResult, DomainError> {
        require_name("backup name", &request.backup_name)?;
        if request.confirm != Some(true) {
            return Err(DomainError::confirmation(format!(
                "set confirm=true to delete backup `{}`",
                request.backup_name
            )));
        }
        let result = self.database.delete_backup(&request.backup_name)?;
        warn!(target: "endee_mcp::service", backup = %request.backup_name, "backup deleted");
        Ok(result)
    }

    pub fn health_check(&self) -> HealthStatusResponse {
        let status = match self.database.health() {
            Ok(body) if body.get("status").and_then(Value::as_str) == Some("ok") => {
                "healthy".to_string()
            }
            Ok(_) => "unhealthy".to_string(),
            Err(err) => format!("error: {err}"),
        };

        let embedding_provider = match self.embeddings.provider() {
            Ok(provider) => provider.provider_name().to_string(),
            Err(err) => format!("unavailable: {err}"),
        };

        HealthStatusResponse {
            status,
            endee_url: self.settings.endee.url.clone(),
            timestamp: Utc::now().timestamp(),
            embedding_provider,
            local_model_loaded: self.embeddings.is_local_model_loaded(),
        }
    }

    pub fn stats(&self) -> Result<Value, DomainError> {
        self.database.stats()
    }

    pub fn config(&self) -> ConfigResponse {
        let embedding = &self.settings.embedding;
        let embedding_dimension = self.embeddings.provider().ok().map(|p| p.dimension());

        ConfigResponse {
            endee_url: self.settings.endee.url.clone(),
            endee_auth_enabled: self.settings.endee.is_auth_enabled(),
            embedding_provider: embedding.mode.id().to_string(),
            embedding_provider_actual: self.embeddings.resolved_kind().id().to_string(),
            openai_model: embedding.openai_model.clone(),
            local_model: embedding.local_model.clone(),
            embedding_dimension,
            openai_key_configured: embedding.is_openai_configured(),
            mcp_transport: self.settings.transport.id().to_string(),
            mcp_sse_port: self.settings.sse.port,
        }
    }
}
