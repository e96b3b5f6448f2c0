//! Gateway error kinds.
//!
//! Every terminal failure on the request path is one of these variants and is
//! turned into an HTTP response by `http::response` or the fallback dispatcher.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that can occur while routing and forwarding a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route pattern matched the request path.
    #[error("No route matched path {path}")]
    NoRouteMatched { path: String },

    /// Connection-level failure: registry miss, refused connection, timeout.
    #[error("Backend {service} unreachable: {reason}")]
    BackendUnreachable { service: String, reason: String },

    /// Every backend of the service is at the gateway's own connection limit.
    /// No backend was contacted.
    #[error("Gateway connection limit reached for {service}")]
    GatewayBusy { service: String },

    /// Backend answered with a 5xx status.
    #[error("Backend returned server error {status}")]
    BackendError { status: StatusCode },

    /// Backend answered with a 4xx status.
    #[error("Backend rejected request with {status}")]
    ClientError { status: StatusCode },

    /// Every permitted attempt failed.
    #[error("Retries exhausted after {attempts} attempt(s), last failure: {last}")]
    RetriesExhausted { attempts: u32, last: ErrorKind },

    /// The route's circuit breaker is not admitting requests.
    #[error("Circuit breaker {name} is open")]
    BreakerOpen { name: String },
}

impl GatewayError {
    /// The coarse kind of this error, used for logging and metric labels.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoRouteMatched { .. } => ErrorKind::NoRouteMatched,
            GatewayError::BackendUnreachable { .. } => ErrorKind::BackendUnreachable,
            GatewayError::GatewayBusy { .. } => ErrorKind::GatewayBusy,
            GatewayError::BackendError { .. } => ErrorKind::BackendError,
            GatewayError::ClientError { .. } => ErrorKind::ClientError,
            GatewayError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            GatewayError::BreakerOpen { .. } => ErrorKind::BreakerOpen,
        }
    }
}

/// Fieldless mirror of [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoRouteMatched,
    BackendUnreachable,
    GatewayBusy,
    BackendError,
    ClientError,
    RetriesExhausted,
    BreakerOpen,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoRouteMatched => "no_route_matched",
            ErrorKind::BackendUnreachable => "backend_unreachable",
            ErrorKind::GatewayBusy => "gateway_busy",
            ErrorKind::BackendError => "backend_error",
            ErrorKind::ClientError => "client_error",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::BreakerOpen => "breaker_open",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = GatewayError::BreakerOpen { name: "cb".into() };
        assert_eq!(err.kind(), ErrorKind::BreakerOpen);

        let err = GatewayError::RetriesExhausted {
            attempts: 3,
            last: ErrorKind::BackendUnreachable,
        };
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(
            err.to_string(),
            "Retries exhausted after 3 attempt(s), last failure: backend_unreachable"
        );
    }
}
