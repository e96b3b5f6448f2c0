//! Degraded responses served when a breaker is open or retries run out.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::routing::router::service_name;

const GENERIC_LABEL: &str = "Service";

/// JSON body of every fallback response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackBody {
    pub message: String,
    pub status: u16,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: String,
}

impl FallbackBody {
    pub fn unavailable(label: &str) -> Self {
        Self {
            message: format!("{label} is currently unavailable. Please try again later."),
            status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// `user-service` → `User Service`.
pub fn service_label(service: &str) -> String {
    service
        .split(['-', '_', '.'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps fallback paths to the service label shown to callers.
#[derive(Debug, Clone, Default)]
pub struct FallbackDispatcher {
    labels: HashMap<String, String>,
}

impl FallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `[[fallbacks]]` entry, then any breaker fallback path not
    /// covered by one, labelled after the route's backend service.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut dispatcher = Self::new();
        for fallback in &config.fallbacks {
            dispatcher.register(&fallback.path, &fallback.service);
        }
        for route in &config.routes {
            let Some(path) = route.circuit_breaker().and_then(|cb| cb.fallback_path.as_deref()) else {
                continue;
            };
            if dispatcher.labels.contains_key(path) {
                continue;
            }
            let label = service_name(&route.backend_service)
                .map(|name| service_label(&name))
                .unwrap_or_else(|| GENERIC_LABEL.to_string());
            dispatcher.register(path, &label);
        }
        dispatcher
    }

    pub fn register(&mut self, path: &str, label: &str) {
        self.labels.insert(path.to_string(), label.to_string());
    }

    /// Registered fallback paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.labels.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn label_for(&self, fallback_path: Option<&str>) -> &str {
        fallback_path
            .and_then(|path| self.labels.get(path))
            .map(String::as_str)
            .unwrap_or(GENERIC_LABEL)
    }

    /// The 503 response for `fallback_path`. Never fails.
    pub fn respond(&self, fallback_path: Option<&str>) -> Response {
        let body = FallbackBody::unavailable(self.label_for(fallback_path));
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }

    /// Serve the fallback for a route whose backend call failed with `cause`.
    pub fn dispatch(&self, route_id: &str, fallback_path: Option<&str>, cause: &GatewayError) -> Response {
        tracing::warn!(
            route = %route_id,
            fallback = fallback_path.unwrap_or("-"),
            cause = %cause,
            "Serving fallback response"
        );
        metrics::record_fallback(route_id, cause.kind());
        self.respond(fallback_path)
    }
}
