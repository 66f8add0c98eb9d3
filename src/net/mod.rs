//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum-server (accept loop, optional TLS handshake via tls.rs)
//!     → http::transport (one task per request)
//!     → inflight.rs (request tracked until its task finishes)
//! ```
//!
//! # Design Decisions
//! - Each request task is tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod inflight;
pub mod tls;

pub use inflight::{InflightGuard, InflightTracker};
