//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, attempts, retries, breakers, fallbacks)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-route and per-backend metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by route
//! - `gateway_backend_attempts_total` (counter): forwarder attempts by route, result
//! - `gateway_retries_total` (counter): retries scheduled by route
//! - `gateway_circuit_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `gateway_circuit_breaker_transitions_total` (counter): by breaker, from, to
//! - `gateway_circuit_breaker_rejections_total` (counter): short-circuited attempts
//! - `gateway_fallbacks_total` (counter): fallbacks served by route, cause
//! - `gateway_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - `metrics` facade: every call is a no-op until a recorder is installed,
//!   so tests and library users pay nothing
//! - Labels for route, breaker, backend, status code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::resilience::circuit_breaker::BreakerState;
use crate::resilience::outcome::RequestOutcome;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, method: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_backend_attempt(route: &str, outcome: &RequestOutcome) {
    let result = outcome.error_kind.map(|k| k.as_str()).unwrap_or("success");
    counter!(
        "gateway_backend_attempts_total",
        "route" => route.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_retry(route: &str) {
    counter!("gateway_retries_total", "route" => route.to_string()).increment(1);
}

fn state_value(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    }
}

pub fn record_breaker_registered(name: &str) {
    gauge!("gateway_circuit_breaker_state", "breaker" => name.to_string()).set(state_value(BreakerState::Closed));
}

pub fn record_breaker_transition(name: &str, from: BreakerState, to: BreakerState) {
    counter!(
        "gateway_circuit_breaker_transitions_total",
        "breaker" => name.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("gateway_circuit_breaker_state", "breaker" => name.to_string()).set(state_value(to));
}

pub fn record_breaker_rejection(name: &str) {
    counter!("gateway_circuit_breaker_rejections_total", "breaker" => name.to_string()).increment(1);
}

pub fn record_fallback(route: &str, cause: ErrorKind) {
    counter!(
        "gateway_fallbacks_total",
        "route" => route.to_string(),
        "cause" => cause.as_str()
    )
    .increment(1);
}

pub fn record_backend_health(backend: &str, service: &str, healthy: bool) {
    gauge!(
        "gateway_backend_health",
        "backend" => backend.to_string(),
        "service" => service.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
