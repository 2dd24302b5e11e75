use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    application::services::EmbeddingProvider, domain::DomainError, settings::EmbeddingSettings,
};

/// Inputs per request accepted by the OpenAI embeddings endpoint.
pub const MAX_INPUTS_PER_REQUEST: usize = 2048;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Known output sizes; unknown models are assumed to match `text-embedding-3-small`.
pub fn openai_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Remote embeddings through an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiProvider {
    name: String,
    model: String,
    endpoint: String,
    api_key: String,
    dimension: usize,
    agent: ureq::Agent,
}

impl OpenAiProvider {
    pub fn try_new(settings: &EmbeddingSettings) -> Result<Self, DomainError> {
        let api_key = settings.openai_api_key.trim();
        if api_key.is_empty() {
            return Err(DomainError::missing_credential(
                "OPENAI_API_KEY is required for the openai embedding provider",
            ));
        }

        let model = settings.openai_model.trim().to_string();
        Ok(Self {
            name: format!("openai-{model}"),
            dimension: openai_dimension(&model),
            endpoint: format!("{}/embeddings", settings.openai_base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            model,
        })
    }

    fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: chunk,
        };
        let body = serde_json::to_value(&request)
            .map_err(|err| DomainError::embedding(format!("failed to encode request: {err}")))?;

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => {
                    let text = response.into_string().unwrap_or_default();
                    DomainError::embedding(format!("OpenAI API error ({status}): {}", text.trim()))
                }
                ureq::Error::Transport(transport) => {
                    DomainError::embedding(format!("OpenAI request failed: {transport}"))
                }
            })?;

        let payload: EmbeddingResponse = response
            .into_json()
            .map_err(|err| DomainError::embedding(format!("invalid OpenAI response: {err}")))?;

        order_by_index(payload.data, chunk.len())
    }
}

/// Puts embeddings back in input order. Every index in `0..expected` must
/// appear exactly once.
fn order_by_index(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, DomainError> {
    if data.len() != expected {
        return Err(DomainError::embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|d| d.index);
    if let Some((position, entry)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
        return Err(DomainError::embedding(format!(
            "OpenAI response index {} does not match input position {position}",
            entry.index
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            vectors.extend(self.embed_chunk(chunk)?);
        }
        debug!(
            target: "endee_mcp::embeddings",
            model = %self.model,
            count = vectors.len(),
            "openai embeddings generated"
        );
        Ok(vectors)
    }
}
