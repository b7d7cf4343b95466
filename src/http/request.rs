//! Inbound request validation.
//!
//! # Responsibilities
//! - Extract the bearer credential before any upstream work happens
//! - Keep the credential opaque: never parsed, decoded, logged or cached
//! - Read the request ID assigned by the request-id layer

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::relay::error::RelayError;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header the credential arrives on and is forwarded under.
pub const CREDENTIAL_HEADER: HeaderName = header::AUTHORIZATION;

/// Opaque bearer credential, forwarded byte-for-byte.
#[derive(Clone)]
pub struct Credential(HeaderValue);

impl Credential {
    /// The exact header value received from the client.
    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Pull the credential off the inbound request.
///
/// Header lookup is case-insensitive. A missing header, or one holding only
/// whitespace, fails with `AuthMissing`.
pub fn extract_credential(headers: &HeaderMap) -> Result<Credential, RelayError> {
    let value = headers
        .get(&CREDENTIAL_HEADER)
        .ok_or(RelayError::AuthMissing)?;

    if value.as_bytes().trim_ascii().is_empty() {
        return Err(RelayError::AuthMissing);
    }

    Ok(Credential(value.clone()))
}

/// Request ID set by the request-id middleware, if any.
pub fn request_id(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers.get(&X_REQUEST_ID)
}
