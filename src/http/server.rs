//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create the Axum router (relay route, preflight, health check)
//! - Wire up middleware (request ID, tracing)
//! - Validate, connect, commit headers, then hand off to the pump task
//! - Serve until shutdown, cancelling live relay sessions

use axum::{
    body::Body,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::{ConfigError, RelayConfig};
use crate::http::request::{self, extract_credential};
use crate::http::response::{preflight_response, stream_response};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::relay::{
    downstream_channel, run_pump, PumpSettings, RelayError, SessionTracker, UpstreamConnector,
};

/// Liveness endpoint path.
pub const HEALTH_ROUTE: &str = "/healthz";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub connector: UpstreamConnector,
    pub sessions: SessionTracker,
    pub shutdown: CancellationToken,
}

/// HTTP server for the event relay.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// `shutdown` is observed by every relay session the server starts.
    pub fn new(config: RelayConfig, shutdown: &Shutdown) -> Result<Self, ConfigError> {
        let connector = UpstreamConnector::new(&config.upstream)?;

        tracing::info!(
            upstream = %connector.url(),
            route = %config.listener.route,
            idle_timeout_secs = ?config.timeouts.idle_secs,
            "Relay configured"
        );

        let state = AppState {
            config: Arc::new(config),
            connector,
            sessions: SessionTracker::new(),
            shutdown: shutdown.token(),
        };

        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let route = state.config.listener.route.clone();

        Router::new()
            .route(&route, get(relay_handler).options(preflight_handler))
            .route(HEALTH_ROUTE, get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!(
            active_sessions = self.state.sessions.active_count(),
            "HTTP server stopped"
        );
        Ok(())
    }

    /// Tracker of currently open relay sessions.
    pub fn sessions(&self) -> SessionTracker {
        self.state.sessions.clone()
    }
}

/// Relay handler: validate, connect, commit, stream.
async fn relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let request_id = request::request_id(&headers).cloned();

    let credential = extract_credential(&headers).inspect_err(|e| {
        tracing::debug!(request_id = ?request_id, "Rejected stream request without credential");
        metrics::record_rejected(e.outcome_label());
    })?;

    let upstream = state
        .connector
        .open(&credential, request_id.as_ref())
        .await
        .inspect_err(|e| {
            tracing::warn!(request_id = ?request_id, error = %e, "Upstream connect failed");
            metrics::record_rejected(e.outcome_label());
        })?;

    let guard = state.sessions.track();
    let (sink, body) = downstream_channel();
    let settings = PumpSettings {
        idle_timeout: state.config.timeouts.idle(),
        shutdown: state.shutdown.child_token(),
    };

    let span = tracing::info_span!(
        "relay_session",
        session_id = %guard.id(),
        request_id = ?request_id,
    );
    tokio::spawn(
        async move {
            tracing::info!(upstream_status = %upstream.status(), "Relay session started");
            let report = run_pump(upstream, sink, settings).await;
            metrics::record_session_finished(report.outcome_label(), guard.started());
            tracing::info!(
                outcome = report.outcome_label(),
                chunks = report.chunks,
                bytes = report.bytes,
                elapsed_ms = guard.started().elapsed().as_millis() as u64,
                "Relay session finished"
            );
            drop(guard);
        }
        .instrument(span),
    );

    Ok(stream_response(Body::from_stream(body)))
}

async fn preflight_handler() -> Response {
    preflight_response()
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: u64,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.active_count(),
    })
}
