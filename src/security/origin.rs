//! Cross-origin access policy.

use std::collections::HashSet;
use std::net::IpAddr;
use url::{Host, Url};

/// Outcome of evaluating an `Origin` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginDecision {
    /// Cross-origin request from an origin that is not permitted.
    Deny,
    /// No `Origin` header; no CORS headers are needed.
    AllowPublic,
    /// Permitted origin; the response may expose credentials.
    AllowWithCredentials,
}

/// Decides which origins may read responses.
///
/// Loopback origins are always permitted unless `allow_loopback` is
/// switched off explicitly.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    permitted: HashSet<String>,
    allow_loopback: bool,
}

impl OriginPolicy {
    pub fn new<I, S>(permitted: I, allow_loopback: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            permitted: permitted
                .into_iter()
                .map(|origin| normalize(origin.as_ref()))
                .collect(),
            allow_loopback,
        }
    }

    pub fn evaluate(&self, origin: Option<&str>) -> OriginDecision {
        let Some(origin) = origin else {
            return OriginDecision::AllowPublic;
        };
        if self.allow_loopback && is_loopback_origin(origin) {
            return OriginDecision::AllowWithCredentials;
        }
        if self.permitted.contains(&normalize(origin)) {
            OriginDecision::AllowWithCredentials
        } else {
            OriginDecision::Deny
        }
    }

    pub fn permitted_origins(&self) -> impl Iterator<Item = &str> {
        self.permitted.iter().map(String::as_str)
    }
}

/// Serialized origin as browsers send it: lowercase host, no default port.
fn normalize(origin: &str) -> String {
    let origin = origin.trim();
    match Url::parse(origin) {
        Ok(url) if url.origin().is_tuple() => url.origin().ascii_serialization(),
        _ => origin.trim_end_matches('/').to_string(),
    }
}

/// Matches by parsed hostname so `http://localhost.evil.example` is not
/// mistaken for loopback.
pub fn is_loopback_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin.trim()) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}
