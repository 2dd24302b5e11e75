use anyhow::{Context, Result};

use endee_mcp::settings::Settings;

/// MCP server for the Endee vector database.
///
/// Configuration comes from the environment (`ENDEE_URL`, `EMBEDDING_PROVIDER`,
/// `MCP_TRANSPORT`, ...). With the default stdio transport the binary is meant
/// to be spawned by an MCP client:
///
/// ```json
/// {
///   "mcpServers": {
///     "endee": {
///       "command": "/path/to/endee-mcp",
///       "env": { "ENDEE_URL": "http://localhost:8080" }
///     }
///   }
/// }
/// ```
fn main() {
    if let Err(err) = try_main() {
        eprintln!("[endee-mcp] Runtime failed: {err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(endee_mcp::run(settings))
}
