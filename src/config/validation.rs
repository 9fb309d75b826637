//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, delay within window)
//! - Parse every path pattern and origin the chain will use
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system; any error is fatal

use std::fmt;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use axum::http::Method;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::PathPattern;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_authority(&mut errors, "upstream.address", &config.upstream.address);
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    let limits = &config.rate_limit;
    if limits.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if limits.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if limits.soft_delay_ms > 0 {
        if limits.soft_delay_ms >= limits.window_secs.saturating_mul(1000) {
            errors.push(ValidationError::new(
                "rate_limit.soft_delay_ms",
                "must be shorter than the window",
            ));
        }
        if limits.soft_delay_ms >= config.timeouts.request_secs.saturating_mul(1000) {
            errors.push(ValidationError::new(
                "rate_limit.soft_delay_ms",
                "must be shorter than timeouts.request_secs",
            ));
        }
    }
    if limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }
    check_patterns(&mut errors, "rate_limit.limited_paths", &limits.limited_paths);
    check_patterns(&mut errors, "rate_limit.exempt_paths", &limits.exempt_paths);

    for (i, origin) in config.cors.permitted_origins.iter().enumerate() {
        if let Err(message) = check_origin(origin) {
            errors.push(ValidationError::new(
                format!("cors.permitted_origins[{}]", i),
                message,
            ));
        }
    }
    for (i, method) in config.cors.allowed_methods.iter().enumerate() {
        if Method::from_bytes(method.trim().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("cors.allowed_methods[{}]", i),
                format!("invalid method {:?}", method),
            ));
        }
    }

    for (i, rule) in config.cache.rules.iter().enumerate() {
        let field = format!("cache.rules[{}]", i);
        if let Err(e) = rule.pattern.parse::<PathPattern>() {
            errors.push(ValidationError::new(&field, e.to_string()));
        }
        match (rule.no_store, rule.max_age_secs) {
            (true, Some(_)) => errors.push(ValidationError::new(
                &field,
                "no_store cannot be combined with max_age_secs",
            )),
            (true, None) if rule.immutable => errors.push(ValidationError::new(
                &field,
                "no_store cannot be immutable",
            )),
            (false, None) => errors.push(ValidationError::new(
                &field,
                "either max_age_secs or no_store is required",
            )),
            (false, Some(0)) if rule.immutable => errors.push(ValidationError::new(
                &field,
                "immutable rules need a max_age_secs greater than 0",
            )),
            _ => {}
        }
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, addr: &str) {
    if addr.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("invalid socket address {:?}", addr),
        ));
    }
}

/// Upstreams may be named hosts, but must carry a port.
fn check_authority(errors: &mut Vec<ValidationError>, field: &str, addr: &str) {
    match addr.parse::<Authority>() {
        Ok(authority) if authority.port_u16().is_some() => {}
        _ => errors.push(ValidationError::new(
            field,
            format!("expected host:port, got {:?}", addr),
        )),
    }
}

fn check_patterns(errors: &mut Vec<ValidationError>, field: &str, patterns: &[String]) {
    for (i, raw) in patterns.iter().enumerate() {
        if let Err(e) = raw.parse::<PathPattern>() {
            errors.push(ValidationError::new(format!("{}[{}]", field, i), e.to_string()));
        }
    }
}

/// Origins are `scheme://host[:port]` with nothing after the authority.
fn check_origin(origin: &str) -> Result<(), String> {
    let trimmed = origin.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| format!("invalid origin {:?}: {}", origin, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("origin {:?} must use http or https", origin));
    }
    if url.host().is_none() {
        return Err(format!("origin {:?} has no host", origin));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!("origin {:?} must not carry a path", origin));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CacheRuleConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 0;
        config.rate_limit.window_secs = 0;
        config.rate_limit.limited_paths = vec!["api/*".into()];
        config.cors.permitted_origins = vec!["not an origin".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"rate_limit.max_requests"));
        assert!(fields.contains(&"rate_limit.window_secs"));
        assert!(fields.contains(&"rate_limit.soft_delay_ms"));
        assert!(fields.contains(&"rate_limit.limited_paths[0]"));
        assert!(fields.contains(&"cors.permitted_origins[0]"));
    }

    #[test]
    fn test_soft_delay_bounds() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = 2;
        config.rate_limit.soft_delay_ms = 2000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "rate_limit.soft_delay_ms");

        // A delay outliving the request timeout would always end in a 408.
        config.rate_limit.window_secs = 60;
        config.rate_limit.soft_delay_ms = 5000;
        config.timeouts.request_secs = 5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("timeouts.request_secs"));

        config.rate_limit.soft_delay_ms = 4999;
        assert_eq!(validate_config(&config), Ok(()));

        config.rate_limit.soft_delay_ms = 0;
        config.rate_limit.window_secs = 1;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_origin_shapes() {
        assert!(check_origin("https://app.example.com").is_ok());
        assert!(check_origin("http://localhost:3000/").is_ok());
        assert!(check_origin("https://app.example.com/path").is_err());
        assert!(check_origin("ftp://files.example.com").is_err());
        assert!(check_origin("app.example.com").is_err());
    }

    #[test]
    fn test_cache_rule_shapes() {
        let mut config = GatewayConfig::default();
        config.cache.rules = vec![
            CacheRuleConfig {
                pattern: "/a/*".into(),
                max_age_secs: None,
                immutable: false,
                no_store: false,
            },
            CacheRuleConfig {
                pattern: "/b/*".into(),
                max_age_secs: Some(10),
                immutable: false,
                no_store: true,
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_bad_addresses() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.upstream.address = "localhost".into();
        assert_eq!(validate_config(&config).unwrap_err().len(), 2);
    }
}
