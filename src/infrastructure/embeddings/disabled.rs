//! Provider used when embeddings are switched off (`EMBEDDING_PROVIDER=none`).

use crate::{application::services::EmbeddingProvider, domain::DomainError};

/// Refuses every embedding call, including empty batches, so text-based tools
/// fail loudly instead of writing vectors of the wrong shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn provider_name(&self) -> &str {
        "none"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimension(&self) -> usize {
        0
    }

    fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        Err(DomainError::EmbeddingDisabled)
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>, DomainError> {
        Err(DomainError::EmbeddingDisabled)
    }
}
