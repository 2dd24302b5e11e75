//! Infrastructure layer wiring concrete adapters (Endee HTTP client, embeddings).

pub mod embeddings;
pub mod http_client;

pub use embeddings::{DisabledProvider, LocalProvider, OpenAiProvider, ProviderSelector};
pub use http_client::EndeeClient;
