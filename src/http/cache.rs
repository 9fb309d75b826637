//! Response cache directives.
//!
//! # Responsibilities
//! - Map a request path to a directive set (first matching rule wins)
//! - Write `Cache-Control`, and `Pragma`/`Expires` for no-store responses
//!
//! # Design Decisions
//! - Unmatched paths are dynamic content and never cached
//! - Only the three cache header names are owned; others are left alone

use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::{HeaderMap, HeaderValue};
use std::time::Duration;

use crate::routing::PathPattern;

/// Thirty days, the lifetime for versioned static assets.
pub const DEFAULT_ASSET_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const NO_STORE: &str = "no-cache, no-store, must-revalidate, max-age=0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDirectives {
    pub max_age: Option<Duration>,
    pub immutable: bool,
    pub no_store: bool,
}

impl CacheDirectives {
    pub const fn no_store() -> Self {
        Self {
            max_age: None,
            immutable: false,
            no_store: true,
        }
    }

    pub const fn immutable(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            immutable: true,
            no_store: false,
        }
    }

    pub const fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            immutable: false,
            no_store: false,
        }
    }

    /// Render the `Cache-Control` value.
    pub fn cache_control(&self) -> String {
        if self.no_store {
            return NO_STORE.to_string();
        }
        let max_age = self.max_age.unwrap_or_default().as_secs();
        if self.immutable {
            format!("public, max-age={}, immutable", max_age)
        } else {
            format!("public, max-age={}", max_age)
        }
    }

    /// Overwrite the cache headers on an outgoing response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.cache_control()) {
            headers.insert(CACHE_CONTROL, value);
        }
        if self.no_store {
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheRule {
    pub pattern: PathPattern,
    pub directives: CacheDirectives,
}

/// Ordered rule table.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    rules: Vec<CacheRule>,
}

impl CachePolicy {
    pub fn new(rules: Vec<CacheRule>) -> Self {
        Self { rules }
    }

    pub fn directives_for(&self, path: &str) -> CacheDirectives {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.directives)
            .unwrap_or(CacheDirectives::no_store())
    }

    pub fn rules(&self) -> &[CacheRule] {
        &self.rules
    }
}

impl Default for CachePolicy {
    /// `/assets/*` and fingerprinted files are immutable, everything else
    /// is no-store.
    fn default() -> Self {
        Self::new(vec![
            CacheRule {
                pattern: PathPattern::Prefix("/assets/".into()),
                directives: CacheDirectives::immutable(DEFAULT_ASSET_MAX_AGE),
            },
            CacheRule {
                pattern: PathPattern::Fingerprinted,
                directives: CacheDirectives::immutable(DEFAULT_ASSET_MAX_AGE),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprinted_asset_is_immutable() {
        let policy = CachePolicy::default();
        let directives = policy.directives_for("/assets/app.3f2a1c.js");

        assert!(directives.immutable);
        assert_eq!(directives.max_age, Some(DEFAULT_ASSET_MAX_AGE));
        assert_eq!(
            directives.cache_control(),
            "public, max-age=2592000, immutable"
        );

        // Outside /assets the filename alone is enough.
        assert!(policy.directives_for("/static/index-4b1e9d0a.css").immutable);
    }

    #[test]
    fn test_dynamic_path_is_no_store() {
        let policy = CachePolicy::default();
        let directives = policy.directives_for("/api/conversations");
        assert_eq!(directives, CacheDirectives::no_store());

        let mut headers = HeaderMap::new();
        directives.apply(&mut headers);
        assert_eq!(headers[CACHE_CONTROL], NO_STORE);
        assert_eq!(headers[PRAGMA], "no-cache");
        assert_eq!(headers[EXPIRES], "0");
    }

    #[test]
    fn test_first_rule_wins() {
        let policy = CachePolicy::new(vec![
            CacheRule {
                pattern: "/assets/private/*".parse().unwrap(),
                directives: CacheDirectives::no_store(),
            },
            CacheRule {
                pattern: "/assets/*".parse().unwrap(),
                directives: CacheDirectives::max_age(Duration::from_secs(60)),
            },
        ]);

        assert!(policy.directives_for("/assets/private/key.js").no_store);
        assert_eq!(
            policy.directives_for("/assets/logo.svg").cache_control(),
            "public, max-age=60"
        );
    }

    #[test]
    fn test_immutable_leaves_legacy_headers_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert("x-handler", HeaderValue::from_static("kept"));
        CacheDirectives::immutable(Duration::from_secs(10)).apply(&mut headers);

        assert!(headers.get(PRAGMA).is_none());
        assert_eq!(headers["x-handler"], "kept");
    }

    #[test]
    fn test_directives_are_deterministic() {
        let policy = CachePolicy::default();
        for path in ["/", "/assets/a.js", "/api/x", "/assets/app.3f2a1c.js"] {
            assert_eq!(policy.directives_for(path), policy.directives_for(path));
        }
    }
}
