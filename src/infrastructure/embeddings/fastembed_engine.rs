use std::str::FromStr;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use parking_lot::Mutex;

use crate::domain::DomainError;

use super::local::TextEncoder;

/// ONNX sentence encoder backed by `fastembed`'s `TextEmbedding`.
///
/// The model needs `&mut` access for inference, so it lives behind a `Mutex`.
pub struct FastEmbedEncoder {
    dimension: usize,
    inner: Mutex<TextEmbedding>,
}

fn resolve_model(label: &str) -> Result<EmbeddingModel, DomainError> {
    match label {
        "sentence-transformers/all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "sentence-transformers/all-mpnet-base-v2" => Ok(EmbeddingModel::AllMpnetBaseV2),
        "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BAAI/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => EmbeddingModel::from_str(other).map_err(|err| {
            DomainError::embedding(format!("unsupported fastembed model `{other}`: {err}"))
        }),
    }
}

impl FastEmbedEncoder {
    /// Downloads (on first use) and initialises the named model.
    pub fn try_new(model_name: &str) -> Result<Self, DomainError> {
        let label = model_name.trim();
        if label.is_empty() {
            return Err(DomainError::validation(
                "local embedding model name cannot be empty",
            ));
        }

        let embedding_model = resolve_model(label)?;
        let model_info = TextEmbedding::get_model_info(&embedding_model).map_err(|err| {
            DomainError::embedding(format!(
                "unable to read metadata for fastembed model `{label}`: {err}"
            ))
        })?;

        let text_embedding = TextEmbedding::try_new(TextInitOptions::new(embedding_model.clone()))
            .map_err(|err| {
                DomainError::embedding(format!(
                    "failed to initialise fastembed model `{label}`: {err}"
                ))
            })?;

        Ok(Self {
            dimension: model_info.dim,
            inner: Mutex::new(text_embedding),
        })
    }
}

impl TextEncoder for FastEmbedEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut embedder = self.inner.lock();
        let vectors = embedder
            .embed(texts.to_vec(), None)
            .map_err(|err| DomainError::embedding(format!("fastembed inference failed: {err}")))?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(DomainError::embedding(format!(
                "unexpected embedding dimension (expected {}, got {})",
                self.dimension,
                bad.len()
            )));
        }
        Ok(vectors)
    }
}
