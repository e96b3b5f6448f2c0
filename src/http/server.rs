//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with gateway, fallback and admin handlers
//! - Wire up middleware (tracing, limits, request ID, overall deadline)
//! - Bind server to listener
//! - Dispatch requests through route table, retry executor and breaker
//! - Forward requests to upstream backends
//! - Serve fallbacks for failed breaker-protected routes

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::error::ErrorKind;
use crate::health::HealthMonitor;
use crate::http::forwarder::ProxyForwarder;
use crate::http::request::{add_forwarded_headers, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::load_balancer::{BackendManager, ServiceRegistry};
use crate::observability::metrics;
use crate::resilience::{BreakerRegistry, FallbackDispatcher, RetryExecutor, RetryFailure};
use crate::routing::{Route, RouteError, RouteTable};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub breakers: Arc<BreakerRegistry>,
    pub fallbacks: Arc<FallbackDispatcher>,
    pub forwarder: ProxyForwarder,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
    backends: Option<Arc<BackendManager>>,
}

impl HttpServer {
    /// Create a server resolving services through the configured backends.
    pub fn new(config: GatewayConfig) -> Result<Self, RouteError> {
        let backends = Arc::new(BackendManager::new(&config.backends, config.load_balancer.strategy));
        let mut server = Self::with_registry(config, backends.clone())?;
        server.backends = Some(backends);
        Ok(server)
    }

    /// Create a server resolving services through `registry`.
    pub fn with_registry(config: GatewayConfig, registry: Arc<dyn ServiceRegistry>) -> Result<Self, RouteError> {
        let breakers = Arc::new(BreakerRegistry::new());
        let routes = Arc::new(RouteTable::from_config(&config.routes, &breakers)?);
        let fallbacks = Arc::new(FallbackDispatcher::from_config(&config));

        let state = AppState {
            routes,
            breakers,
            fallbacks,
            forwarder: ProxyForwarder::new(registry, &config.timeouts),
            max_body_bytes: config.listener.max_body_bytes,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            state,
            config,
            backends: None,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new();
        for path in state.fallbacks.paths() {
            router = router.route(&path, get(fallback_handler));
        }
        if config.admin.enabled {
            router = router.merge(admin::router(&config.admin.base_path));
        }

        // Outermost first: the request id exists before the trace span opens.
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id(request.headers()).unwrap_or("-"),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .map_response(|response: Response<_>| response.map(Body::new))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes));

        router
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// A handle on the axum router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.routes.routes().len(),
            breakers = self.state.breakers.len(),
            "HTTP server starting"
        );

        if let Some(backends) = &self.backends {
            if self.config.health_check.enabled {
                let monitor = HealthMonitor::new(backends.clone(), self.config.health_check.clone());
                tokio::spawn(monitor.run(shutdown.resubscribe()));
            }
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `GET <fallback path>`: the degraded response, regardless of breaker state.
async fn fallback_handler(State(state): State<AppState>, uri: Uri) -> Response {
    state.fallbacks.respond(Some(uri.path()))
}

/// Main gateway handler.
/// Matches a route, then forwards under the route's retry policy and breaker.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let matched = match state.routes.match_path(&path) {
        Ok(m) => m,
        Err(err) => {
            tracing::debug!(path = %path, "No route matched");
            metrics::record_request("none", method.as_str(), StatusCode::NOT_FOUND.as_u16(), started.elapsed());
            return err.into_response();
        }
    };
    let route = matched.route;

    let response = forward_with_resilience(&state, route, &matched.outbound_path, request).await;
    metrics::record_request(&route.id, method.as_str(), response.status().as_u16(), started.elapsed());
    response
}

async fn forward_with_resilience(state: &AppState, route: &Route, outbound_path: &str, request: Request<Body>) -> Response {
    let client = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let (mut parts, body) = request.into_parts();

    let target = match parts.uri.query() {
        Some(query) => format!("{outbound_path}?{query}"),
        None => outbound_path.to_string(),
    };
    let uri: Uri = match target.parse() {
        Ok(uri) => uri,
        Err(_) => return bad_request("unparsable request target"),
    };
    add_forwarded_headers(&mut parts.headers, client);

    let method = parts.method.clone();
    let attempts = route.retry.attempts_for(&method);

    // A body can only be replayed if it was buffered up front.
    let mut streaming = None;
    let buffered: Option<Bytes> = if attempts > 1 {
        match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => Some(bytes),
            Err(_) => return payload_too_large(state.max_body_bytes),
        }
    } else {
        streaming = Some(body);
        None
    };

    let build = |body: Body| {
        let mut request = Request::new(body);
        *request.method_mut() = method.clone();
        *request.uri_mut() = uri.clone();
        *request.headers_mut() = parts.headers.clone();
        request
    };

    tracing::debug!(route = %route.id, service = %route.backend_service, target = %target, "Route matched");

    let forwarder = &state.forwarder;
    let service = route.backend_service.as_str();
    let result = RetryExecutor::new(&route.id, &route.retry)
        .with_breaker(route.breaker())
        .execute(&method, |attempt| {
            let body = match &buffered {
                Some(bytes) => Body::from(bytes.clone()),
                None => streaming.take().unwrap_or_else(Body::empty),
            };
            let request = build(body);
            tracing::debug!(route = %route.id, attempt, "Dispatching attempt");
            async move { forwarder.forward(service, request).await }
        })
        .await;

    match result {
        Ok(response) => response,
        Err(failure) => terminal_response(state, route, failure),
    }
}

/// Response for a call that failed for good.
fn terminal_response(state: &AppState, route: &Route, failure: RetryFailure) -> Response {
    let RetryFailure {
        error, last_response, ..
    } = failure;

    let degradable = matches!(error.kind(), ErrorKind::RetriesExhausted | ErrorKind::BreakerOpen);
    if let (Some(binding), true) = (&route.breaker, degradable) {
        return state
            .fallbacks
            .dispatch(&route.id, binding.fallback_path.as_deref(), &error);
    }

    match last_response {
        Some(response) => response,
        None => error.into_response(),
    }
}

fn bad_request(message: &str) -> Response {
    let body = serde_json::json!({
        "error": "bad_request",
        "message": message,
        "status": StatusCode::BAD_REQUEST.as_u16(),
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn payload_too_large(limit: usize) -> Response {
    let body = serde_json::json!({
        "error": "payload_too_large",
        "message": format!("request body exceeds {limit} bytes"),
        "status": StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
    });
    (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
}
