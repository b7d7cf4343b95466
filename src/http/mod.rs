//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (credential check, before any upstream work)
//!     → [relay connector opens the upstream]
//!     → response.rs (commit event-stream headers)
//!     → [relay pump streams the body]
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{extract_credential, Credential, X_REQUEST_ID};
pub use server::{AppState, HttpServer, HEALTH_ROUTE};
