//! In-process sentence-embedding provider with lazy model loading.

use std::{sync::Arc, time::Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{application::services::EmbeddingProvider, domain::DomainError};

/// A loaded model that turns texts into dense vectors.
pub trait TextEncoder: Send + Sync {
    fn dimension(&self) -> usize;

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;
}

/// Builds the encoder on first use.
pub type EncoderLoader = Box<dyn Fn() -> Result<Arc<dyn TextEncoder>, DomainError> + Send + Sync>;

enum LoadState {
    Unloaded,
    Loading,
    Loaded(Arc<dyn TextEncoder>),
}

/// Output size for the well-known sentence-transformers / BGE models.
pub fn local_dimension(model: &str) -> usize {
    match model {
        "sentence-transformers/all-MiniLM-L6-v2" | "BAAI/bge-small-en-v1.5" => 384,
        "sentence-transformers/all-mpnet-base-v2" | "BAAI/bge-base-en-v1.5" => 768,
        _ => 384,
    }
}

pub struct LocalProvider {
    name: String,
    model: String,
    dimension: usize,
    state: RwLock<LoadState>,
    load_guard: Mutex<()>,
    loader: EncoderLoader,
}

impl LocalProvider {
    /// Provider for `model`, backed by fastembed when the `fastembed-engine`
    /// feature is enabled and by the token-hashing encoder otherwise.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = local_dimension(&model);
        let loader_model = model.clone();
        Self::with_loader(
            model,
            Box::new(move || default_encoder(&loader_model, dimension)),
        )
    }

    pub fn with_loader(model: impl Into<String>, loader: EncoderLoader) -> Self {
        let model = model.into();
        let short = model.rsplit('/').next().unwrap_or(&model).to_string();
        Self {
            name: format!("local-{short}"),
            dimension: local_dimension(&model),
            model,
            state: RwLock::new(LoadState::Unloaded),
            load_guard: Mutex::new(()),
            loader,
        }
    }

    fn loaded(&self) -> Option<Arc<dyn TextEncoder>> {
        match &*self.state.read() {
            LoadState::Loaded(encoder) => Some(Arc::clone(encoder)),
            LoadState::Unloaded | LoadState::Loading => None,
        }
    }

    /// Returns the encoder, loading it exactly once across concurrent callers.
    fn ensure_loaded(&self) -> Result<Arc<dyn TextEncoder>, DomainError> {
        if let Some(encoder) = self.loaded() {
            return Ok(encoder);
        }

        let _guard = self.load_guard.lock();
        if let Some(encoder) = self.loaded() {
            return Ok(encoder);
        }

        *self.state.write() = LoadState::Loading;
        info!(target: "endee_mcp::embeddings", model = %self.model, "loading local embedding model");
        let started = Instant::now();

        match (self.loader)() {
            Ok(encoder) => {
                *self.state.write() = LoadState::Loaded(Arc::clone(&encoder));
                info!(
                    target: "endee_mcp::embeddings",
                    model = %self.model,
                    dimension = encoder.dimension(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "local embedding model loaded"
                );
                Ok(encoder)
            }
            Err(err) => {
                *self.state.write() = LoadState::Unloaded;
                warn!(target: "endee_mcp::embeddings", model = %self.model, error = %err, "local model failed to load");
                Err(err)
            }
        }
    }
}

impl EmbeddingProvider for LocalProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.loaded()
            .map(|encoder| encoder.dimension())
            .unwrap_or(self.dimension)
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_loaded()?.encode(texts)
    }

    fn is_model_loaded(&self) -> bool {
        matches!(&*self.state.read(), LoadState::Loaded(_))
    }

    fn warm_up(&self) -> Result<(), DomainError> {
        self.ensure_loaded().map(|_| ())
    }
}

#[cfg(feature = "fastembed-engine")]
fn default_encoder(model: &str, _dimension: usize) -> Result<Arc<dyn TextEncoder>, DomainError> {
    Ok(Arc::new(super::fastembed_engine::FastEmbedEncoder::try_new(model)?))
}

#[cfg(not(feature = "fastembed-engine"))]
fn default_encoder(_model: &str, dimension: usize) -> Result<Arc<dyn TextEncoder>, DomainError> {
    Ok(Arc::new(super::hashing::HashingEncoder::try_new(dimension)?))
}
