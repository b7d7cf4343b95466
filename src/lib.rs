//! Authenticated live-event relay.
//!
//! Accepts a long-lived GET carrying a bearer credential, opens one
//! authenticated stream to a fixed upstream event endpoint, and forwards
//! the upstream bytes chunk by chunk without buffering or reframing.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
