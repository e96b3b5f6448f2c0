//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use axum::http::StatusCode;
use edge_gateway::config::{
    BackendConfig, CircuitBreakerConfig, FallbackConfig, FilterConfig, GatewayConfig, RetryConfig, RouteConfig,
};
use edge_gateway::http::{AppState, HttpServer};
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::load_balancer::{Endpoint, RegistryError, ServiceRegistry};

/// What a mock backend saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut parts = line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let target = parts.next().unwrap_or_default().to_string();

                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((k, v)) = line.split_once(':') {
                        headers.push((k.trim().to_string(), v.trim().to_string()));
                    }
                }

                let (status, body) = f(RecordedRequest { method, target, headers }).await;
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut socket = reader.into_inner();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Mock backend answering every request with the same status and body.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_backend(move |_| async move { (status, body.to_string()) }).await
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Registry that resolves every service to one address and counts lookups,
/// i.e. backend attempts.
#[derive(Debug)]
pub struct CountingRegistry {
    addr: SocketAddr,
    calls: AtomicU32,
}

impl CountingRegistry {
    pub fn new(addr: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            addr,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ServiceRegistry for CountingRegistry {
    fn resolve(&self, _service: &str) -> Result<Endpoint, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Endpoint::fixed(self.addr))
    }
}

/// The user-service setup: `/api/users/**` behind `userServiceCircuitBreaker`
/// with retry, plus the swagger route with a prefix rewrite.
pub fn user_service_config(backend: SocketAddr, max_attempts: u32) -> GatewayConfig {
    let mut breaker = CircuitBreakerConfig::named("userServiceCircuitBreaker");
    breaker.fallback_path = Some("/fallback/users".into());

    let retry = RetryConfig {
        max_attempts,
        base_delay_ms: 10,
        max_delay_ms: 50,
        ..RetryConfig::default()
    };

    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.timeouts.connect_ms = 500;
    config.timeouts.upstream_ms = 2_000;
    config.backends.push(BackendConfig {
        name: "user-service-1".into(),
        service: "user-service".into(),
        address: backend.to_string(),
        max_connections: 1_000,
    });
    config.fallbacks.push(FallbackConfig {
        path: "/fallback/users".into(),
        service: "User Service".into(),
    });
    config.routes.push(RouteConfig {
        id: "user-service".into(),
        path_patterns: vec!["/api/users/**".into()],
        rewrite: None,
        backend_service: "lb://user-service".into(),
        filters: vec![FilterConfig::CircuitBreaker(breaker), FilterConfig::Retry(retry)],
    });
    config.routes.push(RouteConfig {
        id: "user-service-swagger".into(),
        path_patterns: vec![
            "/user-service/v3/api-docs/**".into(),
            "/user-service/swagger-ui/**".into(),
        ],
        rewrite: Some(edge_gateway::config::RewriteConfig {
            pattern: "/user-service/(?<segment>.*)".into(),
            replacement: "/${segment}".into(),
        }),
        backend_service: "lb://user-service".into(),
        filters: vec![],
    });
    config
}

/// A running gateway on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig, registry: Option<Arc<dyn ServiceRegistry>>) -> TestGateway {
    let server = match registry {
        Some(registry) => HttpServer::with_registry(config, registry).unwrap(),
        None => HttpServer::new(config).unwrap(),
    };
    let state = server.state().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, receiver).await.unwrap();
    });

    TestGateway { addr, state, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
