//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Map gateway errors to HTTP status codes and JSON bodies
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically, including those named by Connection
//! - Backend failures without a fallback result in 502 Bad Gateway

use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::GatewayError;

/// RFC 7230 hop-by-hop headers.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(HeaderName::from_static("proxy-connection"));
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            GatewayError::BackendUnreachable { .. } | GatewayError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BreakerOpen { .. } | GatewayError::GatewayBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BackendError { status } | GatewayError::ClientError { status } => *status,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.kind().as_str(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::http::HeaderValue;

    #[test]
    fn strips_standard_and_connection_named_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session-hint"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn maps_errors_to_status() {
        let cases = [
            (GatewayError::NoRouteMatched { path: "/x".into() }, StatusCode::NOT_FOUND),
            (
                GatewayError::RetriesExhausted {
                    attempts: 3,
                    last: ErrorKind::BackendUnreachable,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (GatewayError::BreakerOpen { name: "cb".into() }, StatusCode::SERVICE_UNAVAILABLE),
            (
                GatewayError::GatewayBusy {
                    service: "user-service".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::BackendError {
                    status: StatusCode::GATEWAY_TIMEOUT,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
