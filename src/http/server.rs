//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the health probe and the `/api` proxy
//! - Wire up middleware (request ID, CORS, tracing, denylist, rate limit)
//! - Forward admitted requests to the upstream backend
//! - Run the dormant-key sweep next to the server
//!
//! # Middleware order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Cors → Trace → router
//!     /health                        → 200 "OK"
//!     /api, /api/*  → denylist → rate limit → proxy_handler
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{AuthHeaderResolver, IdentityTokenProvider, MetadataServerProvider};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::ProxyRequest;
use crate::lifecycle::shutdown::{shutdown_signal, Shutdown};
use crate::observability::metrics;
use crate::security::cors::cors_layer;
use crate::security::denylist::denylist_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::security::store::MemoryStore;
use crate::upstream::UpstreamClient;

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub auth: AuthHeaderResolver,
    pub json_limit: usize,
}

/// HTTP server for the BFF gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    store: Arc<MemoryStore>,
}

impl HttpServer {
    /// Create a server that mints identity tokens from the metadata server
    /// unless running in local development.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config.upstream)?;
        let provider: Option<Arc<dyn IdentityTokenProvider>> = if config.is_local_development() {
            None
        } else {
            Some(Arc::new(MetadataServerProvider::new(
                upstream.http().clone(),
                config.identity.metadata_url.clone(),
            )))
        };
        Ok(Self::assemble(config, upstream, provider))
    }

    /// Create a server with an explicit identity provider. The provider is
    /// ignored in local development.
    pub fn with_identity_provider(
        config: GatewayConfig,
        provider: Arc<dyn IdentityTokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config.upstream)?;
        Ok(Self::assemble(config, upstream, Some(provider)))
    }

    fn assemble(
        config: GatewayConfig,
        upstream: UpstreamClient,
        provider: Option<Arc<dyn IdentityTokenProvider>>,
    ) -> Self {
        let auth = match (provider, upstream.base_url()) {
            (Some(provider), Some(base)) if !config.is_local_development() => {
                AuthHeaderResolver::with_identity(provider, base)
            }
            _ => AuthHeaderResolver::local(),
        };

        let store = Arc::new(MemoryStore::default());
        let limiter = Arc::new(RateLimiter::new(
            store.clone(),
            &config.rate_limit,
            config.listener.trusted_proxy_hops,
        ));

        let state = AppState {
            upstream,
            auth,
            json_limit: config.body.json_limit_bytes,
        };

        let router = Self::build_router(&config, state, limiter);
        Self {
            router,
            config,
            store,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState, limiter: Arc<RateLimiter>) -> Router {
        let api = Router::new()
            .route("/api", any(proxy_handler))
            .route("/api/", any(proxy_handler))
            .route("/api/{*path}", any(proxy_handler))
            .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .route_layer(middleware::from_fn(denylist_middleware))
            .with_state(state);

        let mut router = Router::new()
            .route("/health", get(health))
            .merge(api)
            .layer(TraceLayer::new_for_http());

        if let Some(cors) = cors_layer(&config.cors) {
            router = router.layer(cors);
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = ?self.config.upstream.base_url,
            service_identity = !self.config.is_local_development(),
            "HTTP server starting"
        );

        if let Some(interval) = self.config.rate_limit.sweep_interval() {
            tokio::spawn(sweep_dormant_keys(self.store.clone(), interval, shutdown.subscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Router without connection info, for embedding.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle to this instance's rate-limit store.
    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

/// Liveness probe. Never rate limited.
async fn health() -> &'static str {
    "OK"
}

/// Forward one `/api` request upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let start = Instant::now();
    let method = request.method().to_string();

    let result = forward(&state, request).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    metrics::record_request(&method, status.as_u16(), start);
    result
}

async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, GatewayError> {
    let request = ProxyRequest::extract(request, state.json_limit).await?;

    let target = state
        .upstream
        .target_url(request.upstream_suffix())
        .ok_or(GatewayError::NoUpstream)?;

    tracing::info!(
        request_id = ?request.request_id,
        method = %request.method,
        path = %request.original_uri,
        target = %target,
        multipart = request.is_multipart,
        "Proxying request"
    );

    let ProxyRequest {
        method,
        authorization,
        request_id,
        body,
        ..
    } = request;

    let auth = state.auth.resolve(authorization.as_ref()).await?;

    let response = state
        .upstream
        .forward(method, &target, &auth, body, request_id.as_ref())
        .await?;

    Ok(response.into_response())
}

/// Periodically drop keys with no hit inside the window.
async fn sweep_dormant_keys(
    store: Arc<MemoryStore>,
    interval: Duration,
    mut stop: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.sweep();
                let remaining = store.key_count();
                if removed > 0 {
                    tracing::debug!(removed, remaining, "Swept dormant rate limit keys");
                }
                metrics::set_rate_limit_keys(remaining);
            }
            _ = stop.recv() => break,
        }
    }
}
