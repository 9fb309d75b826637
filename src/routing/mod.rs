//! Path matching subsystem.
//!
//! # Data Flow
//! ```text
//! config strings ("/api/*", "/healthz", "@fingerprinted")
//!     → matcher.rs (parse into PathPattern)
//!     → rate limit stage (limited / exempt path sets)
//!     → cache policy (ordered rule table)
//! ```

pub mod matcher;

pub use matcher::{parse_patterns, PathPattern, PatternError};
