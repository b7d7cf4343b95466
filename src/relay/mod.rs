//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! validated credential
//!     → connector.rs (open the fixed upstream stream)
//!     → session.rs (track the open upstream)
//!     → pump.rs (chunk-by-chunk forwarding, cancellation, idle timeout)
//!     → error.rs (failure classification and mapping)
//! ```
//!
//! # Design Decisions
//! - One task per relay session, owning its upstream exclusively
//! - Sessions share only immutable config and the HTTP client pool
//! - Every exit path of the pump releases the upstream

pub mod connector;
pub mod error;
pub mod pump;
pub mod session;

pub use connector::{UpstreamConnector, UpstreamSession};
pub use error::RelayError;
pub use pump::{downstream_channel, run_pump, PumpReport, PumpSettings, PumpState};
pub use session::{SessionGuard, SessionId, SessionTracker};
