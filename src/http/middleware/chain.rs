//! Admission chain.
//!
//! # Request lifecycle
//! ```text
//! Received
//!   → origin gate   deny (preflight/strict) ───────────────────┐ 403
//!   → CorsLayer     allowed preflight answered here ───────────┤ 200
//!   → Cache         directives computed, applied on return     │
//!   → RateLimit     reject ────────────────────────────────────┤ 429
//!                   delay → sleep → commit                     │
//!   → handler                                                  │
//!   → cache directives, CORS headers on the way back ◀─────────┘
//!   → Sent
//! ```
//!
//! # Design Decisions
//! - Interceptors are a fixed, typed list built once at startup
//! - `OriginPolicy` decides; `tower_http::cors` writes the headers
//! - Everything an interceptor reads is copied out of the request before
//!   the first await, so the request itself is only touched by the handler
//! - The soft-throttle sleep is the only suspension point; dropping the
//!   request future there drops the grace permit, which records nothing
//! - Handler responses pass through unchanged apart from the owned
//!   CORS and cache headers

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
        },
        request::Parts,
        HeaderMap, HeaderValue, Method, Request,
    },
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowCredentials, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::schema::GatewayConfig;
use crate::config::ConfigError;
use crate::http::cache::{CacheDirectives, CachePolicy};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::{parse_patterns, PathPattern};
use crate::security::{
    ClientKey, Clock, Decision, OriginDecision, OriginPolicy, RateLimiter, TokioClock,
    WindowPolicy,
};

/// What the interceptors see of a request.
#[derive(Debug)]
struct RequestHead {
    path: String,
    client: ClientKey,
}

impl RequestHead {
    fn new(request: &Request<Body>, trust_forwarded_for: bool) -> Self {
        Self {
            path: request.uri().path().to_string(),
            client: ClientKey::from_request(request, trust_forwarded_for),
        }
    }
}

enum Step {
    Continue(Option<CacheDirectives>),
    Respond(Response),
}

/// What the origin gate does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Pass,
    /// Serve it, but strip any CORS grant from the response.
    Withhold,
    Refuse,
}

/// Cross-origin stage.
#[derive(Debug, Clone)]
pub struct OriginStage {
    policy: OriginPolicy,
    strict: bool,
    allowed_methods: Vec<Method>,
    max_age: Duration,
}

impl OriginStage {
    pub fn new(policy: OriginPolicy) -> Self {
        Self {
            policy,
            strict: false,
            allowed_methods: Vec::new(),
            max_age: Duration::from_secs(600),
        }
    }

    /// Refuse denied simple requests with 403 instead of only withholding
    /// the CORS headers.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Methods advertised to preflights; empty echoes the requested method.
    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.to_vec();
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// CORS response headers for the origins the policy admits.
    pub fn cors_layer(&self) -> CorsLayer {
        let origins = self.policy.clone();
        let credentials = self.policy.clone();
        let methods = if self.allowed_methods.is_empty() {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::list(self.allowed_methods.clone())
        };

        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _: &Parts| credentialed(&origins, origin),
            ))
            .allow_credentials(AllowCredentials::predicate(
                move |origin: &HeaderValue, _: &Parts| credentialed(&credentials, origin),
            ))
            .allow_methods(methods)
            .allow_headers(AllowHeaders::mirror_request())
            .max_age(self.max_age)
    }

    fn gate(&self, headers: &HeaderMap, method: &Method) -> Gate {
        let Some(origin) = headers.get(ORIGIN) else {
            return Gate::Pass;
        };
        let preflight =
            method == Method::OPTIONS && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD);

        if credentialed(&self.policy, origin) {
            if preflight {
                metrics::record_decision("origin", "preflight");
            }
            return Gate::Pass;
        }

        metrics::record_decision("origin", "deny");
        tracing::debug!(
            origin = origin.to_str().unwrap_or_default(),
            preflight,
            "Cross-origin request denied"
        );
        if preflight || self.strict {
            Gate::Refuse
        } else {
            Gate::Withhold
        }
    }
}

fn credentialed(policy: &OriginPolicy, origin: &HeaderValue) -> bool {
    // An unreadable Origin is still cross-origin; it just never matches.
    let origin = origin.to_str().unwrap_or_default();
    policy.evaluate(Some(origin)) == OriginDecision::AllowWithCredentials
}

/// Remove any grant the handler made to an origin the policy denies.
fn withhold_cors(headers: &mut HeaderMap) {
    headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
    headers.remove(ACCESS_CONTROL_ALLOW_CREDENTIALS);
    append_vary_origin(headers);
}

fn append_vary_origin(headers: &mut HeaderMap) {
    let present = headers.get_all(VARY).iter().any(|value| {
        value.to_str().is_ok_and(|v| {
            v.split(',')
                .map(str::trim)
                .any(|field| field == "*" || field.eq_ignore_ascii_case("origin"))
        })
    });
    if !present {
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}

/// Throttling stage.
#[derive(Debug)]
pub struct RateLimitStage {
    limiter: RateLimiter,
    limited: Vec<PathPattern>,
    exempt: Vec<PathPattern>,
}

impl RateLimitStage {
    /// Limit every path under `limited` except those under `exempt`.
    pub fn new(
        limiter: RateLimiter,
        limited: Vec<PathPattern>,
        exempt: Vec<PathPattern>,
    ) -> Self {
        Self {
            limiter,
            limited,
            exempt,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn applies_to(&self, path: &str) -> bool {
        !self.exempt.iter().any(|p| p.matches(path)) && self.limited.iter().any(|p| p.matches(path))
    }

    async fn admit(&self, head: &RequestHead, clock: &dyn Clock) -> Step {
        if !self.applies_to(&head.path) {
            return Step::Continue(None);
        }

        match self.limiter.evaluate(head.client.as_str(), clock.now()) {
            Decision::Allow => {
                metrics::record_decision("rate_limit", "allow");
                Step::Continue(None)
            }
            Decision::AllowAfterDelay { delay, permit } => {
                metrics::record_decision("rate_limit", "delay");
                tracing::debug!(
                    client = %head.client,
                    path = %head.path,
                    delay_ms = delay.as_millis() as u64,
                    "Soft rate limit reached, delaying request"
                );
                tokio::time::sleep(delay).await;
                permit.commit(clock.now());
                Step::Continue(None)
            }
            Decision::Reject { retry_after } => {
                metrics::record_decision("rate_limit", "reject");
                tracing::info!(
                    client = %head.client,
                    path = %head.path,
                    retry_after_secs = response::retry_after_secs(retry_after),
                    "Rate limit exceeded"
                );
                Step::Respond(response::rate_limited(retry_after))
            }
        }
    }
}

/// One admission step behind the origin gate.
#[derive(Debug)]
pub enum Interceptor {
    Cache(CachePolicy),
    RateLimit(RateLimitStage),
}

impl Interceptor {
    async fn before(&self, head: &RequestHead, clock: &dyn Clock) -> Step {
        match self {
            Interceptor::Cache(policy) => Step::Continue(Some(policy.directives_for(&head.path))),
            Interceptor::RateLimit(stage) => stage.admit(head, clock).await,
        }
    }
}

/// Ordered admission pipeline wrapped around the application handler.
#[derive(Debug)]
pub struct AdmissionChain {
    origin: Option<OriginStage>,
    interceptors: Vec<Interceptor>,
    clock: Arc<dyn Clock>,
    trust_forwarded_for: bool,
}

impl AdmissionChain {
    pub fn builder() -> AdmissionChainBuilder {
        AdmissionChainBuilder::default()
    }

    /// Build the chain described by a validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::builder()
            .trust_forwarded_for(config.rate_limit.trust_forwarded_for);

        if config.cors.enabled {
            let methods = config
                .cors
                .allowed_methods
                .iter()
                .map(|m| Method::from_bytes(m.trim().as_bytes()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::Invalid(format!("cors.allowed_methods: {}", e)))?;
            let stage = OriginStage::new(OriginPolicy::new(
                &config.cors.permitted_origins,
                config.cors.allow_loopback,
            ))
            .strict(config.cors.strict)
            .allowed_methods(&methods)
            .max_age(Duration::from_secs(config.cors.max_age_secs));
            builder = builder.origin(stage);
        }

        if config.cache.enabled {
            let rules = config
                .cache
                .rules
                .iter()
                .map(|rule| rule.to_rule())
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.interceptor(Interceptor::Cache(CachePolicy::new(rules)));
        }

        if config.rate_limit.enabled {
            let limits = &config.rate_limit;
            let limiter = RateLimiter::new(WindowPolicy {
                max_requests: limits.max_requests,
                window: Duration::from_secs(limits.window_secs),
                soft_delay: (limits.soft_delay_ms > 0)
                    .then(|| Duration::from_millis(limits.soft_delay_ms)),
            });
            let stage = RateLimitStage::new(
                limiter,
                parse_patterns(&limits.limited_paths)?,
                parse_patterns(&limits.exempt_paths)?,
            );
            builder = builder.interceptor(Interceptor::RateLimit(stage));
        }

        Ok(builder.build())
    }

    pub fn origin(&self) -> Option<&OriginStage> {
        self.origin.as_ref()
    }

    pub fn interceptors(&self) -> &[Interceptor] {
        &self.interceptors
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.interceptors.iter().find_map(|i| match i {
            Interceptor::RateLimit(stage) => Some(stage.limiter()),
            _ => None,
        })
    }

    /// Release limiter state for clients whose windows have emptied.
    pub fn sweep(&self) -> usize {
        let Some(limiter) = self.rate_limiter() else {
            return 0;
        };
        let removed = limiter.sweep(self.clock.now());
        metrics::record_tracked_clients(limiter.tracked_clients());
        removed
    }

    /// Run the request through every interceptor, then `next`.
    ///
    /// The origin gate and CORS headers live outside this, in [`Self::layer`].
    pub async fn run<F, Fut>(&self, request: Request<Body>, next: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let head = RequestHead::new(&request, self.trust_forwarded_for);
        let mut directives = Vec::with_capacity(self.interceptors.len());

        for interceptor in &self.interceptors {
            match interceptor.before(&head, self.clock.as_ref()).await {
                Step::Continue(Some(cache)) => directives.push(cache),
                Step::Continue(None) => {}
                Step::Respond(mut short_circuit) => {
                    decorate(short_circuit.headers_mut(), &directives);
                    return short_circuit;
                }
            }
        }

        let mut response = next(request).await;
        decorate(response.headers_mut(), &directives);
        response
    }

    /// Wrap a router so every route and the fallback pass through the chain.
    ///
    /// Outermost to innermost: origin gate, `CorsLayer`, interceptors. Synthesized
    /// 429s therefore carry the same CORS headers as handler responses.
    pub fn layer<S>(self: Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router.layer(middleware::from_fn_with_state(
            self.clone(),
            admission_middleware,
        ));
        let Some(cors) = self.origin().map(OriginStage::cors_layer) else {
            return router;
        };
        router
            .layer(cors)
            .layer(middleware::from_fn_with_state(self, origin_gate))
    }
}

fn decorate(headers: &mut HeaderMap, directives: &[CacheDirectives]) {
    for cache in directives.iter().rev() {
        cache.apply(headers);
    }
}

/// Axum middleware entry point for the interceptors.
pub async fn admission_middleware(
    State(chain): State<Arc<AdmissionChain>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    chain.run(request, |request| next.run(request)).await
}

/// Axum middleware refusing or de-crediting denied cross-origin requests.
pub async fn origin_gate(
    State(chain): State<Arc<AdmissionChain>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(stage) = chain.origin() else {
        return next.run(request).await;
    };
    match stage.gate(request.headers(), request.method()) {
        Gate::Pass => next.run(request).await,
        Gate::Withhold => {
            let mut res = next.run(request).await;
            withhold_cors(res.headers_mut());
            res
        }
        Gate::Refuse => {
            let mut denied = response::origin_denied();
            append_vary_origin(denied.headers_mut());
            denied
        }
    }
}

#[derive(Debug, Default)]
pub struct AdmissionChainBuilder {
    origin: Option<OriginStage>,
    interceptors: Vec<Interceptor>,
    clock: Option<Arc<dyn Clock>>,
    trust_forwarded_for: bool,
}

impl AdmissionChainBuilder {
    /// Gate cross-origin requests ahead of every interceptor.
    pub fn origin(mut self, stage: OriginStage) -> Self {
        self.origin = Some(stage);
        self
    }

    /// Append an interceptor; order of calls is order of evaluation.
    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn build(self) -> AdmissionChain {
        AdmissionChain {
            origin: self.origin,
            interceptors: self.interceptors,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}
