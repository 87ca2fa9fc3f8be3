//! Shared utilities for gateway integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;

use swim_bff::auth::{IdentityError, IdentityTokenProvider};
use swim_bff::config::GatewayConfig;
use swim_bff::security::MemoryStore;
use swim_bff::{HttpServer, Shutdown};

pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";
pub const SERVICE_TOKEN: &str = "Bearer service-token";

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct BackendState {
    calls: Arc<Mutex<Vec<RecordedRequest>>>,
    reply: Arc<Mutex<(StatusCode, String, &'static str)>>,
}

/// Programmable upstream that records every call it receives.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    state: BackendState,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = BackendState {
            calls: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(Mutex::new((
                StatusCode::OK,
                r#"{"ok":true}"#.to_string(),
                "application/json",
            ))),
        };

        let app = Router::new().fallback(record).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every following call with `status` and a JSON `body`.
    pub fn respond_json(&self, status: StatusCode, body: &str) {
        *self.state.reply.lock().unwrap() = (status, body.to_string(), "application/json");
    }

    pub fn respond_text(&self, status: StatusCode, body: &str) {
        *self.state.reply.lock().unwrap() = (status, body.to_string(), "text/plain");
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> RecordedRequest {
        self.calls().pop().expect("backend received no request")
    }
}

async fn record(State(state): State<BackendState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    state.calls.lock().unwrap().push(RecordedRequest {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        headers: parts.headers,
        body,
    });

    let (status, body, content_type) = state.reply.lock().unwrap().clone();
    (status, [("content-type", content_type)], body).into_response()
}

/// Identity provider returning a fixed credential.
pub struct StaticIdentity;

#[async_trait]
impl IdentityTokenProvider for StaticIdentity {
    async fn authorization_for(&self, _audience: &str) -> Result<String, IdentityError> {
        Ok(SERVICE_TOKEN.to_string())
    }
}

/// Identity provider that always fails.
pub struct BrokenIdentity;

#[async_trait]
impl IdentityTokenProvider for BrokenIdentity {
    async fn authorization_for(&self, _audience: &str) -> Result<String, IdentityError> {
        Err(IdentityError::EmptyToken)
    }
}

/// Gateway config pointing at `backend_url`, bound to an ephemeral port.
pub fn gateway_config(backend_url: Option<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = backend_url;
    config.cors.allowed_origin = Some(FRONTEND_ORIGIN.into());
    config
}

/// A running gateway instance.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    shutdown: Shutdown,
}

impl TestGateway {
    /// Start with the given config and identity provider.
    pub async fn start(config: GatewayConfig, identity: Arc<dyn IdentityTokenProvider>) -> Self {
        let server = HttpServer::with_identity_provider(config, identity).unwrap();
        Self::spawn(server).await
    }

    /// Start in local development mode: no service identity is minted.
    pub async fn start_local(mut config: GatewayConfig) -> Self {
        config.identity.enabled = false;
        let server = HttpServer::new(config).unwrap();
        Self::spawn(server).await
    }

    async fn spawn(server: HttpServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = server.store();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        wait_for_port(addr).await;
        Self { addr, store, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

async fn wait_for_port(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway did not start listening on {}", addr);
}
