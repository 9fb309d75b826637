//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::cache::{CacheDirectives, CacheRule, DEFAULT_ASSET_MAX_AGE};
use crate::routing::{PathPattern, PatternError, matcher::FINGERPRINTED};

/// Root configuration for the admission gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Application server that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Response cache directives.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client inside one window.
    pub max_requests: usize,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// One-time grace delay in milliseconds when the window is full (0 = off).
    pub soft_delay_ms: u64,

    /// Path patterns subject to limiting.
    pub limited_paths: Vec<String>,

    /// Path patterns never limited, checked first.
    pub exempt_paths: Vec<String>,

    /// Key clients by the left-most X-Forwarded-For entry.
    pub trust_forwarded_for: bool,

    /// Interval in seconds between sweeps of expired client state.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_secs: 1,
            soft_delay_ms: 500,
            limited_paths: vec!["/*".to_string()],
            exempt_paths: vec!["/assets/*".to_string()],
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable the origin stage.
    pub enabled: bool,

    /// Origins allowed with credentials, exact `scheme://host[:port]`.
    /// Replaced by `PERMITTED_CORS_ORIGINS` when that variable is set.
    pub permitted_origins: Vec<String>,

    /// Always allow localhost / loopback origins.
    pub allow_loopback: bool,

    /// Answer denied simple requests with 403 instead of omitting headers.
    pub strict: bool,

    /// Methods advertised to preflights (empty = echo the requested method).
    pub allowed_methods: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permitted_origins: Vec::new(),
            allow_loopback: true,
            strict: false,
            allowed_methods: Vec::new(),
            max_age_secs: 600,
        }
    }
}

/// Cache directive configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the cache stage.
    pub enabled: bool,

    /// Ordered rules; first match wins, no match means no-store.
    pub rules: Vec<CacheRuleConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let asset_age = DEFAULT_ASSET_MAX_AGE.as_secs();
        Self {
            enabled: true,
            rules: vec![
                CacheRuleConfig {
                    pattern: "/assets/*".to_string(),
                    max_age_secs: Some(asset_age),
                    immutable: true,
                    no_store: false,
                },
                CacheRuleConfig {
                    pattern: FINGERPRINTED.to_string(),
                    max_age_secs: Some(asset_age),
                    immutable: true,
                    no_store: false,
                },
            ],
        }
    }
}

/// A single cache rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheRuleConfig {
    /// Path pattern (`/prefix/*`, `/exact`, or `@fingerprinted`).
    pub pattern: String,

    /// `max-age` in seconds.
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    /// Mark the response immutable (requires `max_age_secs`).
    #[serde(default)]
    pub immutable: bool,

    /// Forbid caching entirely.
    #[serde(default)]
    pub no_store: bool,
}

impl CacheRuleConfig {
    pub fn to_rule(&self) -> Result<CacheRule, PatternError> {
        let pattern: PathPattern = self.pattern.parse()?;
        let directives = match (self.no_store, self.max_age_secs) {
            (false, Some(secs)) => CacheDirectives {
                max_age: Some(std::time::Duration::from_secs(secs)),
                immutable: self.immutable,
                no_store: false,
            },
            _ => CacheDirectives::no_store(),
        };
        Ok(CacheRule {
            pattern,
            directives,
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 3
            window_secs = 10

            [cors]
            permitted_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.soft_delay_ms, 500);
        assert_eq!(config.rate_limit.exempt_paths, ["/assets/*"]);
        assert!(config.cors.allow_loopback);
        assert_eq!(config.cache.rules.len(), 2);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_cache_rule_conversion() {
        let rule: CacheRuleConfig = toml::from_str(
            r#"
            pattern = "/docs/*"
            max_age_secs = 300
            "#,
        )
        .unwrap();
        let rule = rule.to_rule().unwrap();
        assert!(rule.pattern.matches("/docs/index.html"));
        assert_eq!(rule.directives.cache_control(), "public, max-age=300");

        let no_store = CacheRuleConfig {
            pattern: "/api/*".into(),
            max_age_secs: None,
            immutable: false,
            no_store: true,
        };
        assert!(no_store.to_rule().unwrap().directives.no_store);
    }

    #[test]
    fn test_log_format_names() {
        let config: ObservabilityConfig = toml::from_str(r#"log_format = "json""#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
