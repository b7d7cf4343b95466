//! Upstream connector.
//!
//! Opens the single fixed streaming route of the event service with the
//! client's credential and classifies what comes back. Nothing is forwarded
//! downstream unless the upstream answered with a success status.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::{ConfigError, UpstreamConfig};
use crate::http::request::{Credential, CREDENTIAL_HEADER, X_REQUEST_ID};
use crate::http::response::{EVENT_STREAM, NO_CACHE};
use crate::relay::error::RelayError;
use crate::relay::pump::ChunkSource;

/// Resolve the upstream stream URL from a base address and a fixed path.
///
/// The path is appended to the base path only; query and fragment stay put.
pub fn stream_url(base_url: &str, stream_path: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), stream_path);
    url.set_path(&path);
    Ok(url)
}

/// Opens upstream sessions. One instance is shared by every relay session.
#[derive(Debug, Clone)]
pub struct UpstreamConnector {
    client: reqwest::Client,
    url: Url,
    response_timeout: Duration,
}

impl UpstreamConnector {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let url = stream_url(&config.base_url, &config.stream_path)?;

        // No overall request timeout: it would also bound the stream body.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .tcp_nodelay(true)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            url,
            response_timeout: config.response_timeout(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the upstream stream for one client.
    pub async fn open(
        &self,
        credential: &Credential,
        request_id: Option<&HeaderValue>,
    ) -> Result<UpstreamSession, RelayError> {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(CREDENTIAL_HEADER, credential.header_value().clone())
            .header(header::ACCEPT, EVENT_STREAM)
            .header(header::CACHE_CONTROL, NO_CACHE);
        if let Some(id) = request_id {
            request = request.header(X_REQUEST_ID, id.clone());
        }

        let response = tokio::time::timeout(self.response_timeout, request.send())
            .await
            .map_err(|_| {
                RelayError::UpstreamUnreachable(format!(
                    "no response headers within {:?}",
                    self.response_timeout
                ))
            })??;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = %status, url = %self.url, "Upstream rejected stream request");
            return Err(RelayError::UpstreamRejected(status));
        }

        tracing::debug!(status = %status, url = %self.url, "Upstream stream opened");
        Ok(UpstreamSession {
            status,
            response: Some(response),
        })
    }
}

/// An open upstream stream. Dropping it closes the connection.
#[derive(Debug)]
pub struct UpstreamSession {
    status: StatusCode,
    response: Option<reqwest::Response>,
}

impl UpstreamSession {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[async_trait]
impl ChunkSource for UpstreamSession {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        match response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.response = None;
                Ok(None)
            }
            Err(e) => {
                self.response = None;
                Err(RelayError::StreamReadError(e.to_string()))
            }
        }
    }

    fn cancel(&mut self) {
        if self.response.take().is_some() {
            tracing::trace!("Upstream connection released");
        }
    }
}
