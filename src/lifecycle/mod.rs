//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     close() → stop accepting → drain in-flight requests → listen returns Ok
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller triggers close()
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: remaining connections are dropped after it
//! - Signal handling is opt-in; library users may close programmatically

pub mod shutdown;
pub mod signals;

pub use shutdown::Closer;
pub use signals::shutdown_signal;
