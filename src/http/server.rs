//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the admission chain from validated configuration
//! - Create the Axum Router: `/healthz` plus a forwarding fallback
//! - Wire up middleware (request ID, tracing, timeout, admission)
//! - Serve with connect info so the chain can key clients by address
//! - Periodically sweep expired rate-limit state

use axum::{http::uri::Authority, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ConfigError, GatewayConfig};
use crate::http::middleware::AdmissionChain;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::upstream::{forward, Upstream};

/// Admission gateway in front of one application server.
pub struct GatewayServer {
    router: Router,
    chain: Arc<AdmissionChain>,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server with the given (validated) configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let chain = Arc::new(AdmissionChain::from_config(&config)?);
        let authority: Authority = config
            .upstream
            .address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("upstream.address: {}", e)))?;
        let upstream = Upstream::new(
            authority,
            Duration::from_secs(config.timeouts.connect_secs),
        );

        let router = Self::build_router(&config, chain.clone(), upstream);
        Ok(Self {
            router,
            chain,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        chain: Arc<AdmissionChain>,
        upstream: Upstream,
    ) -> Router {
        let app = Router::new()
            .route("/healthz", get(healthz))
            .fallback(forward)
            .with_state(upstream);

        // Outermost first: the ID exists before the trace span opens.
        chain.layer(app).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            interceptors = self.chain.interceptors().len(),
            "Gateway listening"
        );

        let sweeper = self.spawn_sweeper(shutdown.resubscribe());
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_sweeper(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let chain = self.chain.clone();
        let every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = chain.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired rate limit state");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    /// The fully layered router, for embedding or `oneshot` tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn chain(&self) -> &Arc<AdmissionChain> {
        &self.chain
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn healthz() -> &'static str {
    "ok"
}
