//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + request ID + timeout layers)
//!     → middleware/chain.rs (origin → cache → rate limit)
//!     → upstream.rs (forward to the application server)
//!     → middleware/chain.rs (CORS + cache headers merged)
//!     → Send to client
//! ```

pub mod cache;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use cache::{CacheDirectives, CachePolicy, CacheRule};
pub use middleware::AdmissionChain;
pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
