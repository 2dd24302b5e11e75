use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod settings;

use application::EndeeService;
use infrastructure::{EndeeClient, ProviderSelector};
use interfaces::mcp::{self, McpEndpointMetadata, McpServerConfig};
use settings::{Settings, Transport};

/// Shared handles built once at startup.
pub struct AppHandles {
    pub service: Arc<EndeeService>,
    pub embeddings: Arc<ProviderSelector>,
}

/// Wire the Endee client, the embedding selector and the service together.
pub fn build_environment(settings: Settings) -> AppHandles {
    let settings = Arc::new(settings);
    let database = Arc::new(EndeeClient::new(&settings.endee));
    let embeddings = Arc::new(ProviderSelector::new(settings.embedding.clone()));

    info!(
        target: "endee_mcp::mcp",
        endee_url = %settings.endee.url,
        auth = settings.endee.is_auth_enabled(),
        embedding_mode = settings.embedding.mode.id(),
        embedding_provider = settings.embedding.resolved_kind().id(),
        transport = settings.transport.id(),
        "environment ready"
    );

    let service = Arc::new(EndeeService::new(
        database,
        Arc::clone(&embeddings) as Arc<dyn application::ProviderSource>,
        settings,
    ));

    AppHandles {
        service,
        embeddings,
    }
}

/// Start the transport selected by `MCP_TRANSPORT`.
pub async fn run(settings: Settings) -> Result<()> {
    init_tracing(&settings.log_filter);
    match settings.transport {
        Transport::Stdio => run_mcp_stdio(settings).await,
        Transport::Sse => run_mcp_sse(settings).await,
    }
}

async fn run_mcp_stdio(settings: Settings) -> Result<()> {
    let handles = build_environment(settings);
    preload_local_model(&handles);

    mcp::serve_stdio(handles.service)
        .await
        .context("MCP stdio server failed")
}

async fn run_mcp_sse(settings: Settings) -> Result<()> {
    let config = McpServerConfig::from(&settings.sse);
    let handles = build_environment(settings);
    preload_local_model(&handles);

    let handle = mcp::spawn_mcp_server(handles.service, config)
        .await
        .context("failed to start MCP SSE runtime")?;

    log_mcp_startup(handle.metadata());
    info!(target: "endee_mcp::mcp", "SSE server running. Press Ctrl+C to exit.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!(target: "endee_mcp::mcp", "shutting down");
    handle.shutdown();
    Ok(())
}

/// Loads the local model in the background so the transport starts immediately.
fn preload_local_model(handles: &AppHandles) {
    let embeddings = Arc::clone(&handles.embeddings);
    tokio::task::spawn_blocking(move || {
        if let Err(err) = embeddings.warm_up() {
            warn!(target: "endee_mcp::embeddings", error = %err, "local model preload failed");
        }
    });
}

fn log_mcp_startup(metadata: &McpEndpointMetadata) {
    let sse_url = metadata.sse_url();
    let post_url = metadata.post_url();
    info!(
        target: "endee_mcp::mcp",
        bind = %metadata.bind_addr,
        sse = %sse_url,
        post = %post_url,
        "MCP runtime listening"
    );
}

/// Install the global subscriber once. Logs go to stderr; stdout belongs to
/// the stdio transport.
pub fn init_tracing(filter: &str) {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_new(filter)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}
