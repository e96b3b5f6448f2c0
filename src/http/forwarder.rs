//! Backend forwarding.
//!
//! # Responsibilities
//! - Resolve the route's logical service to one backend address
//! - Rewrite the request target and Host for that backend
//! - Enforce the per-call timeout
//! - Stream the backend response back without buffering
//!
//! # Design Decisions
//! - Stateless apart from the pooled HTTP client
//! - Any backend response is `Ok`, whatever its status; classification is the
//!   caller's job
//! - Registry misses, connect failures and timeouts are all `BackendUnreachable`
//! - A backend at the gateway's own connection limit is `GatewayBusy`; nothing
//!   is sent

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::http::response::strip_hop_by_hop;
use crate::load_balancer::{RegistryError, ServiceRegistry};

#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: Client<HttpConnector, Body>,
    registry: Arc<dyn ServiceRegistry>,
    call_timeout: Duration,
}

impl ProxyForwarder {
    pub fn new(registry: Arc<dyn ServiceRegistry>, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeouts.connect_ms)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            registry,
            call_timeout: Duration::from_millis(timeouts.upstream_ms),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Send `request` to one backend of `service`.
    ///
    /// The request URI only needs a path and query; scheme and authority are
    /// filled in from the resolved backend.
    pub async fn forward(&self, service: &str, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let unreachable = |reason: String| GatewayError::BackendUnreachable {
            service: service.to_string(),
            reason,
        };

        let endpoint = self.registry.resolve(service).map_err(|e| match e {
            RegistryError::Saturated(_) => GatewayError::GatewayBusy {
                service: service.to_string(),
            },
            e => unreachable(e.to_string()),
        })?;
        let authority = endpoint.addr.to_string();

        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(authority.as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| unreachable(e.to_string()))?;
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        let host = HeaderValue::from_str(&authority).map_err(|e| unreachable(e.to_string()))?;
        parts.headers.insert(header::HOST, host);

        tracing::debug!(service = %service, backend = %authority, uri = %parts.uri, "Forwarding request");

        let call = self.client.request(Request::from_parts(parts, body));
        let response: Response<Incoming> = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!(service = %service, backend = %authority, error = %e, "Backend call failed");
                return Err(unreachable(e.to_string()));
            }
            Err(_) => {
                tracing::debug!(service = %service, backend = %authority, "Backend call timed out");
                return Err(unreachable(format!("timed out after {:?}", self.call_timeout)));
            }
        };
        drop(endpoint);

        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(incoming)))
    }
}
