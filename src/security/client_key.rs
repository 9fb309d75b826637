//! Client identification for throttling.
//!
//! # Design Decisions
//! - The peer address is the default key; NAT'd clients share a bucket
//! - `X-Forwarded-For` is only honored when the gateway sits behind a
//!   trusted proxy, and then only its left-most entry
//! - A request that cannot be attributed maps to the fixed `unknown` key

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::security::rate_limit::UNKNOWN_CLIENT;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Opaque identifier bucketing rate-limit state per client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    /// Derive the key for a request.
    pub fn from_request<B>(request: &Request<B>, trust_forwarded_for: bool) -> Self {
        if trust_forwarded_for {
            if let Some(ip) = forwarded_client(request.headers()) {
                return Self(ip.to_string());
            }
        }
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self(addr.ip().to_string()))
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientKey {
    fn from(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Self::unknown()
        } else {
            Self(raw.to_string())
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
