//! Admission decision engines.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (Origin header → deny / public / credentials)
//!     → client_key.rs (peer address → ClientKey)
//!     → rate_limit.rs (ClientKey + now → allow / delay / reject)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Engines are plain values owned by the chain, never process globals
//! - Time is injected through `Clock` so window tests are deterministic
//! - Only the limiter holds mutable state

pub mod client_key;
pub mod clock;
pub mod origin;
pub mod rate_limit;

pub use client_key::ClientKey;
pub use clock::{Clock, ManualClock, TokioClock};
pub use origin::{OriginDecision, OriginPolicy};
pub use rate_limit::{Decision, GracePermit, RateLimiter, WindowPolicy};
