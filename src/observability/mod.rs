//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch and transport produce:
//!     → logging.rs (structured log events, access-log hook)
//!     → metrics.rs (request counters via the metrics hook)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all log events
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
