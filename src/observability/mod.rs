//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay sessions produce:
//!     → logging.rs (structured log events, one span per session)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID and session ID flow through every log line of a session
//! - Credentials never appear in logs or metric labels

pub mod logging;
pub mod metrics;
