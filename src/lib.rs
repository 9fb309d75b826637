//! HTTP admission-control gateway.
//!
//! An ordered chain of interceptors decides, for every inbound request,
//! whether it may reach the application: cross-origin policy, response
//! cache directives, and a per-client sliding-window rate limiter.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{AdmissionChain, GatewayServer};
pub use lifecycle::Shutdown;
