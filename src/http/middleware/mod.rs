//! Middleware wrapped around application handlers.

pub mod chain;

pub use chain::{
    admission_middleware, origin_gate, AdmissionChain, AdmissionChainBuilder, Interceptor,
    OriginStage, RateLimitStage,
};
