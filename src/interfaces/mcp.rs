use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context as AnyhowContext, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::{
        sse_server::{SseServer, SseServerConfig},
        stdio,
    },
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use serde_json::json;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    application::{
        dtos::{
            CreateBackupRequest, CreateIndexRequest, DeleteBackupRequest, DeleteByFilterRequest,
            DeleteIndexRequest, DeleteVectorRequest, GetVectorRequest, HybridSearchRequest,
            ImportCsvRequest, ImportJsonRequest, IndexNameRequest, RestoreBackupRequest,
            TextSearchRequest, UpdateFiltersRequest, UpsertDocumentsRequest, UpsertVectorsRequest,
            VectorSearchRequest,
        },
        EndeeService,
    },
    domain::DomainError,
    settings::SseSettings,
};

pub const SSE_PATH: &str = "/sse";
pub const POST_PATH: &str = "/message";

/// Static metadata describing the active MCP endpoints.
#[derive(Debug, Clone)]
pub struct McpEndpointMetadata {
    pub bind_addr: SocketAddr,
    pub sse_path: String,
    pub post_path: String,
}

impl McpEndpointMetadata {
    pub fn post_url(&self) -> String {
        format!("http://{}{}", self.bind_addr, self.post_path)
    }

    pub fn sse_url(&self) -> String {
        format!("http://{}{}", self.bind_addr, self.sse_path)
    }
}

/// Runtime configuration for the MCP SSE listener.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub bind_addr: SocketAddr,
    pub sse_path: String,
    pub post_path: String,
    pub keep_alive: Duration,
}

impl From<&SseSettings> for McpServerConfig {
    fn from(settings: &SseSettings) -> Self {
        Self {
            bind_addr: SocketAddr::new(settings.host, settings.port),
            sse_path: SSE_PATH.into(),
            post_path: POST_PATH.into(),
            keep_alive: settings.keep_alive,
        }
    }
}

impl McpServerConfig {
    fn into_pair(self, cancel_token: CancellationToken) -> (SseServerConfig, McpEndpointMetadata) {
        (
            SseServerConfig {
                bind: self.bind_addr,
                sse_path: self.sse_path.clone(),
                post_path: self.post_path.clone(),
                ct: cancel_token,
                sse_keep_alive: Some(self.keep_alive),
            },
            McpEndpointMetadata {
                bind_addr: self.bind_addr,
                sse_path: self.sse_path,
                post_path: self.post_path,
            },
        )
    }
}

/// Handle to the background MCP server. Dropping the handle shuts it down.
#[derive(Clone)]
pub struct McpServerHandle {
    root_token: CancellationToken,
    worker_token: CancellationToken,
    metadata: Arc<McpEndpointMetadata>,
}

impl McpServerHandle {
    pub fn shutdown(&self) {
        self.worker_token.cancel();
        self.root_token.cancel();
    }

    pub fn metadata(&self) -> &McpEndpointMetadata {
        &self.metadata
    }
}

impl Drop for McpServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bind the SSE listener and serve one [`EndeeMcpServer`] per client session.
pub async fn spawn_mcp_server(
    service: Arc<EndeeService>,
    config: McpServerConfig,
) -> Result<McpServerHandle> {
    let root_token = CancellationToken::new();
    let (sse_config, metadata) = config.into_pair(root_token.clone());

    let sse_server = SseServer::serve_with_config(sse_config)
        .await
        .with_context(|| format!("failed to bind MCP SSE listener on {}", metadata.bind_addr))?;

    let worker_token = sse_server.with_service(move || EndeeMcpServer::new(Arc::clone(&service)));

    Ok(McpServerHandle {
        root_token,
        worker_token,
        metadata: Arc::new(metadata),
    })
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(service: Arc<EndeeService>) -> Result<()> {
    info!(target: "endee_mcp::mcp", "starting MCP stdio server");
    let running = EndeeMcpServer::new(service)
        .serve(stdio())
        .await
        .context("failed to start MCP stdio transport")?;
    let reason = running
        .waiting()
        .await
        .context("MCP stdio session failed")?;
    info!(target: "endee_mcp::mcp", ?reason, "MCP stdio server terminated");
    Ok(())
}

#[derive(Clone)]
pub struct EndeeMcpServer {
    service: Arc<EndeeService>,
    tool_router: ToolRouter<Self>,
}

impl EndeeMcpServer {
    pub fn new(service: Arc<EndeeService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect()
    }

    /// Runs a blocking service call off the async runtime and wraps the reply.
    async fn run<T, F>(&self, tool: &'static str, op: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&EndeeService) -> Result<T, DomainError> + Send + 'static,
    {
        debug!(target: "endee_mcp::mcp", tool, "tool invoked");
        let service = Arc::clone(&self.service);
        let output = task::spawn_blocking(move || op(&service))
            .await
            .map_err(|err| internal_error(err.to_string()))?
            .map_err(|err| {
                warn!(target: "endee_mcp::mcp", tool, error = %err, "tool failed");
                map_domain_error(err)
            })?;

        let value = serde_json::to_value(output).map_err(|err| internal_error(err.to_string()))?;
        Ok(CallToolResult::structured(value))
    }
}

#[tool_router]
impl EndeeMcpServer {
    #[tool(
        name = "endee_create_index",
        description = "Create a vector index with the given dimension, metric, precision and HNSW parameters. Set sparse_dimension to enable hybrid search."
    )]
    async fn create_index(
        &self,
        Parameters(payload): Parameters<CreateIndexRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_create_index", move |s| s.create_index(payload))
            .await
    }

    #[tool(name = "endee_list_indexes", description = "List all indexes.")]
    async fn list_indexes(&self) -> Result<CallToolResult, McpError> {
        self.run("endee_list_indexes", |s| s.list_indexes()).await
    }

    #[tool(
        name = "endee_describe_index",
        description = "Show configuration and statistics for one index."
    )]
    async fn describe_index(
        &self,
        Parameters(payload): Parameters<IndexNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_describe_index", move |s| s.describe_index(payload))
            .await
    }

    #[tool(
        name = "endee_delete_index",
        description = "Permanently delete an index and its vectors. Requires confirm=true."
    )]
    async fn delete_index(
        &self,
        Parameters(payload): Parameters<DeleteIndexRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_delete_index", move |s| s.delete_index(payload))
            .await
    }

    #[tool(
        name = "endee_upsert_vectors",
        description = "Insert or replace vectors with pre-computed embeddings."
    )]
    async fn upsert_vectors(
        &self,
        Parameters(payload): Parameters<UpsertVectorsRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_upsert_vectors", move |s| s.upsert_vectors(payload))
            .await
    }

    #[tool(
        name = "endee_upsert_documents",
        description = "Embed text documents with the configured provider and upsert them."
    )]
    async fn upsert_documents(
        &self,
        Parameters(payload): Parameters<UpsertDocumentsRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_upsert_documents", move |s| s.upsert_documents(payload))
            .await
    }

    #[tool(name = "endee_get_vector", description = "Fetch one vector by id.")]
    async fn get_vector(
        &self,
        Parameters(payload): Parameters<GetVectorRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_get_vector", move |s| s.get_vector(payload))
            .await
    }

    #[tool(name = "endee_delete_vector", description = "Delete one vector by id.")]
    async fn delete_vector(
        &self,
        Parameters(payload): Parameters<DeleteVectorRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_delete_vector", move |s| s.delete_vector(payload))
            .await
    }

    #[tool(
        name = "endee_delete_by_filter",
        description = "Delete every vector matching the filter conditions."
    )]
    async fn delete_by_filter(
        &self,
        Parameters(payload): Parameters<DeleteByFilterRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_delete_by_filter", move |s| s.delete_by_filter(payload))
            .await
    }

    #[tool(
        name = "endee_update_filters",
        description = "Replace the filter fields of existing vectors."
    )]
    async fn update_filters(
        &self,
        Parameters(payload): Parameters<UpdateFiltersRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_update_filters", move |s| s.update_filters(payload))
            .await
    }

    #[tool(
        name = "endee_search",
        description = "Nearest-neighbour search with a query vector."
    )]
    async fn search(
        &self,
        Parameters(payload): Parameters<VectorSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_search", move |s| s.search(payload)).await
    }

    #[tool(
        name = "endee_search_text",
        description = "Semantic search: the query text is embedded with the configured provider."
    )]
    async fn search_text(
        &self,
        Parameters(payload): Parameters<TextSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_search_text", move |s| s.search_text(payload))
            .await
    }

    #[tool(
        name = "endee_hybrid_search",
        description = "Combined dense and sparse keyword search on an index created with a sparse dimension."
    )]
    async fn hybrid_search(
        &self,
        Parameters(payload): Parameters<HybridSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_hybrid_search", move |s| s.hybrid_search(payload))
            .await
    }

    #[tool(
        name = "endee_import_json",
        description = "Bulk import records from a JSON array or JSONL file on the server host."
    )]
    async fn import_json(
        &self,
        Parameters(payload): Parameters<ImportJsonRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_import_json", move |s| s.import_json(payload))
            .await
    }

    #[tool(
        name = "endee_import_csv",
        description = "Bulk import rows from a CSV file on the server host."
    )]
    async fn import_csv(
        &self,
        Parameters(payload): Parameters<ImportCsvRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_import_csv", move |s| s.import_csv(payload))
            .await
    }

    #[tool(name = "endee_create_backup", description = "Snapshot an index into a named backup.")]
    async fn create_backup(
        &self,
        Parameters(payload): Parameters<CreateBackupRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_create_backup", move |s| s.create_backup(payload))
            .await
    }

    #[tool(name = "endee_list_backups", description = "List available backups.")]
    async fn list_backups(&self) -> Result<CallToolResult, McpError> {
        self.run("endee_list_backups", |s| s.list_backups()).await
    }

    #[tool(
        name = "endee_restore_backup",
        description = "Restore a backup into a new index."
    )]
    async fn restore_backup(
        &self,
        Parameters(payload): Parameters<RestoreBackupRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_restore_backup", move |s| s.restore_backup(payload))
            .await
    }

    #[tool(
        name = "endee_delete_backup",
        description = "Permanently delete a backup. Requires confirm=true."
    )]
    async fn delete_backup(
        &self,
        Parameters(payload): Parameters<DeleteBackupRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("endee_delete_backup", move |s| s.delete_backup(payload))
            .await
    }

    #[tool(
        name = "endee_health_check",
        description = "Report Endee reachability and the active embedding provider."
    )]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        self.run("endee_health_check", |s| Ok(s.health_check()))
            .await
    }

    #[tool(
        name = "endee_get_config",
        description = "Show the effective configuration without secrets."
    )]
    async fn get_config(&self) -> Result<CallToolResult, McpError> {
        self.run("endee_get_config", |s| Ok(s.config())).await
    }

    #[tool(name = "endee_get_stats", description = "Server-wide statistics reported by Endee.")]
    async fn get_stats(&self) -> Result<CallToolResult, McpError> {
        self.run("endee_get_stats", |s| s.stats()).await
    }
}

#[tool_handler]
impl ServerHandler for EndeeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "endee-mcp".into(),
                title: Some("Endee Vector Database".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"Tools for the Endee vector database.

- Create an index with endee_create_index before writing to it; match its dimension to your vectors or to the embedding provider (see endee_get_config).
- Use endee_upsert_vectors for pre-computed embeddings and endee_upsert_documents to embed text server-side.
- endee_search takes a vector, endee_search_text takes natural language, endee_hybrid_search adds keyword matching on indexes created with sparse_dimension.
- endee_delete_index and endee_delete_backup only run with confirm=true."#
                    .into(),
            ),
        }
    }
}

fn map_domain_error(err: DomainError) -> McpError {
    let detail = err.to_string();
    match err {
        DomainError::Validation(_)
        | DomainError::ConfirmationRequired(_)
        | DomainError::MissingCredential(_)
        | DomainError::EmbeddingDisabled => {
            McpError::invalid_params("invalid request", Some(json!({ "detail": detail })))
        }
        DomainError::FileNotFound(_) | DomainError::RemoteService { status: 404, .. } => {
            McpError::resource_not_found("not found", Some(json!({ "detail": detail })))
        }
        DomainError::RemoteService { status, .. } => McpError::internal_error(
            "endee request failed",
            Some(json!({ "detail": detail, "status": status })),
        ),
        DomainError::Transport(_)
        | DomainError::Decode(_)
        | DomainError::EmbeddingBackend(_)
        | DomainError::Other(_) => {
            McpError::internal_error("internal error", Some(json!({ "detail": detail })))
        }
    }
}

fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(
        "internal MCP server error",
        Some(json!({ "detail": message.into() })),
    )
}
