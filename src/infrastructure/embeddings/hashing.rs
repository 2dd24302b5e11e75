use crate::{
    application::services::sparse::{stable_token_hash, tokenize},
    domain::DomainError,
};

use super::local::TextEncoder;

/// A lightweight, deterministic encoder that hashes tokens into a fixed-size vector.
/// This is not meant for production-grade semantic search, but it keeps the local
/// provider functional without downloading models or shipping native dependencies.
pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    pub fn try_new(dimension: usize) -> Result<Self, DomainError> {
        if dimension == 0 {
            return Err(DomainError::validation(
                "embedding dimension must be greater than zero",
            ));
        }
        Ok(Self { dimension })
    }

    fn encode_one(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut tokens = tokenize(text).peekable();
        if tokens.peek().is_none() {
            return Err(DomainError::validation("text payload has no tokens to embed"));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens {
            let hash = stable_token_hash(&token);
            let idx = (hash % self.dimension as u64) as usize;
            // top bit picks the sign so unrelated collisions tend to cancel
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }

        // L2 normalize to keep cosine scores in [-1, 1]
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

impl TextEncoder for HashingEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        texts.iter().map(|text| self.encode_one(text)).collect()
    }
}
