use thiserror::Error;

/// Domain-level errors shared across application components.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The incoming payload missed a required field or violated invariants.
    #[error("validation error: {0}")]
    Validation(String),

    /// A destructive operation was requested without `confirm = true`.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Batch import source does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Endee answered with a non-2xx status.
    #[error("endee returned HTTP {status}: {body}")]
    RemoteService { status: u16, body: String },

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A response body could not be decoded into the expected shape.
    #[error("decode failure: {0}")]
    Decode(String),

    /// Embedding was requested while the provider is set to `none`.
    #[error("embedding provider is disabled")]
    EmbeddingDisabled,

    /// The selected provider needs a credential that is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The embedding backend failed; no partial result is returned.
    #[error("embedding backend failure: {0}")]
    EmbeddingBackend(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn confirmation(msg: impl Into<String>) -> Self {
        Self::ConfirmationRequired(msg.into())
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::RemoteService {
            status,
            body: body.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn missing_credential(msg: impl Into<String>) -> Self {
        Self::MissingCredential(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingBackend(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Errors after which no further embedding call in the same operation can succeed.
    pub fn is_embedding_unavailable(&self) -> bool {
        matches!(self, Self::EmbeddingDisabled | Self::MissingCredential(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_carries_status_and_body() {
        let err = DomainError::remote(409, "Index already exists");
        match &err {
            DomainError::RemoteService { status, body } => {
                assert_eq!(*status, 409);
                assert_eq!(body, "Index already exists");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn test_embedding_unavailable_classification() {
        assert!(DomainError::EmbeddingDisabled.is_embedding_unavailable());
        assert!(DomainError::missing_credential("OPENAI_API_KEY").is_embedding_unavailable());
        assert!(!DomainError::embedding("timeout").is_embedding_unavailable());
    }
}
