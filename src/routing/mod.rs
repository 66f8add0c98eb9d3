//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before listen):
//!     Group prefix + path
//!     → pattern.rs (normalize, compile segments)
//!     → router.rs (append to method table)
//!
//! Incoming Request (method, path)
//!     → router.rs (bucket by segment count, then catch-alls)
//!     → pattern.rs (segment-wise match, bind params)
//!     → Return: matched Route + Params, or the not-found chain
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod group;
pub mod params;
pub mod pattern;
pub mod router;

pub use group::Group;
pub use params::Params;
pub use pattern::{Pattern, PatternError, Segment};
pub use router::{Resolved, Route, Router};
