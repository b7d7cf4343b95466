//! Relay failure taxonomy and its mapping to observable behavior.
//!
//! | Failure               | Phase          | Observable result                      |
//! |-----------------------|----------------|----------------------------------------|
//! | `AuthMissing`         | before connect | 401, no upstream call                  |
//! | `UpstreamUnreachable` | connect        | 500, empty body                        |
//! | `UpstreamRejected`    | connect        | 500, empty body                        |
//! | `StreamReadError`     | mid-stream     | response aborted without terminator    |
//! | `ClientDisconnect`    | mid-stream     | upstream cancelled, nothing surfaced   |
//! | `IdleTimeout`         | mid-stream     | response aborted, upstream cancelled   |
//! | `Shutdown`            | mid-stream     | response aborted, upstream cancelled   |
//!
//! Only pre-commit failures have a status code. After the commit point a
//! failure can only be expressed by cutting the stream.

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("credential header missing or empty")]
    AuthMissing,

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream rejected the stream request with status {0}")]
    UpstreamRejected(StatusCode),

    #[error("upstream stream failed: {0}")]
    StreamReadError(String),

    #[error("downstream client disconnected")]
    ClientDisconnect,

    #[error("no upstream data for {0:?}")]
    IdleTimeout(Duration),

    #[error("relay shutting down")]
    Shutdown,
}

impl RelayError {
    /// True for failures resolved before response headers are sent.
    pub fn is_pre_commit(&self) -> bool {
        matches!(
            self,
            RelayError::AuthMissing
                | RelayError::UpstreamUnreachable(_)
                | RelayError::UpstreamRejected(_)
        )
    }

    /// Terminal status for a pre-commit failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RelayError::AuthMissing => Some(StatusCode::UNAUTHORIZED),
            RelayError::UpstreamUnreachable(_) | RelayError::UpstreamRejected(_) => {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => None,
        }
    }

    /// Stable label for metrics and logs.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RelayError::AuthMissing => "auth_missing",
            RelayError::UpstreamUnreachable(_) => "upstream_unreachable",
            RelayError::UpstreamRejected(_) => "upstream_rejected",
            RelayError::StreamReadError(_) => "stream_read_error",
            RelayError::ClientDisconnect => "client_disconnect",
            RelayError::IdleTimeout(_) => "idle_timeout",
            RelayError::Shutdown => "shutdown",
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::UpstreamUnreachable(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Post-commit variants are never returned from a handler.
        debug_assert!(self.is_pre_commit(), "post-commit failure mapped to a status: {self}");
        let status = self.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Body::empty()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_commit_failures_map_to_status() {
        assert_eq!(RelayError::AuthMissing.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(
            RelayError::UpstreamRejected(StatusCode::SERVICE_UNAVAILABLE).status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(
            RelayError::UpstreamUnreachable("refused".into()).status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn post_commit_failures_have_no_status() {
        for err in [
            RelayError::StreamReadError("reset".into()),
            RelayError::ClientDisconnect,
            RelayError::IdleTimeout(Duration::from_secs(1)),
            RelayError::Shutdown,
        ] {
            assert!(!err.is_pre_commit());
            assert_eq!(err.status(), None);
        }
    }

    #[tokio::test]
    async fn rejected_response_has_empty_body() {
        let response = RelayError::UpstreamRejected(StatusCode::BAD_GATEWAY).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }
}
