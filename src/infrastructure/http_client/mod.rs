//! Blocking HTTP plumbing for the Endee REST API.

mod endee_client;

pub use endee_client::EndeeClient;

use std::io::Read;

use crate::domain::DomainError;

/// Upper bound for binary (MessagePack) response bodies.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Translate a ureq failure: HTTP statuses keep their code and body, anything
/// that never produced a response becomes a transport error.
pub(crate) fn map_ureq_error(error: ureq::Error) -> DomainError {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            DomainError::remote(code, body.trim())
        }
        ureq::Error::Transport(transport) => DomainError::transport(transport.to_string()),
    }
}

/// Percent-encode a single path segment (index, vector or backup name).
pub(crate) fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

pub(crate) fn read_body_bytes(response: ureq::Response) -> Result<Vec<u8>, DomainError> {
    let mut buffer = Vec::new();
    response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut buffer)
        .map_err(|err| DomainError::transport(format!("failed to read response body: {err}")))?;
    Ok(buffer)
}

pub(crate) fn read_body_text(response: ureq::Response) -> Result<String, DomainError> {
    response
        .into_string()
        .map_err(|err| DomainError::transport(format!("failed to read response body: {err}")))
}
