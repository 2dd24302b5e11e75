//! Application layer wiring DTOs and services for the Endee MCP server.

pub mod dtos;
pub mod services;

pub use dtos::{ConfigResponse, HealthStatusResponse, ImportReport, SearchResponse};
pub use services::{EmbeddingProvider, EndeeService, ProviderSource, VectorDatabase};
