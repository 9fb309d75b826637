//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission chain and gateway produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (decision counters, tracked-client gauge)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Admission rejections are normal outcomes: debug/info, never error
//! - Request ID flows through the trace span of every request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
