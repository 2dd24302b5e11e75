//! Protocol adapters exposing the service to MCP clients.

pub mod mcp;
