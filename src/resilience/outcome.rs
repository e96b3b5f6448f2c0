//! Per-attempt outcome classification.
//!
//! A `RequestOutcome` is produced for every backend attempt and consumed by the
//! retry executor (retry or stop) and the circuit breaker (window update). It is
//! never stored beyond that.

use axum::http::{Response, StatusCode};
use std::time::Duration;

use crate::error::{ErrorKind, GatewayError};

/// Result of a single backend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub success: bool,
    pub status: Option<StatusCode>,
    pub error_kind: Option<ErrorKind>,
    pub elapsed: Duration,
}

impl RequestOutcome {
    /// Classify a backend response status.
    pub fn from_status(status: StatusCode, elapsed: Duration) -> Self {
        let error_kind = if status.is_server_error() {
            Some(ErrorKind::BackendError)
        } else if status.is_client_error() {
            Some(ErrorKind::ClientError)
        } else {
            None
        };
        Self {
            success: error_kind.is_none(),
            status: Some(status),
            error_kind,
            elapsed,
        }
    }

    /// A connection-level failure with no response.
    pub fn unreachable(elapsed: Duration) -> Self {
        Self {
            success: false,
            status: None,
            error_kind: Some(ErrorKind::BackendUnreachable),
            elapsed,
        }
    }

    /// Classify the result of a forwarder call.
    pub fn from_result<B>(result: &Result<Response<B>, GatewayError>, elapsed: Duration) -> Self {
        match result {
            Ok(response) => Self::from_status(response.status(), elapsed),
            Err(err) => Self {
                success: false,
                status: None,
                error_kind: Some(err.kind()),
                elapsed,
            },
        }
    }

    /// Whether a backend was actually contacted. Refusals made locally by the
    /// gateway say nothing about backend health.
    pub fn reached_backend(&self) -> bool {
        self.error_kind != Some(ErrorKind::GatewayBusy)
    }

    /// Whether this outcome counts against the backend in a breaker window.
    /// 4xx responses mean the backend is alive and never count.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(
            self.error_kind,
            Some(ErrorKind::BackendUnreachable) | Some(ErrorKind::BackendError)
        )
    }
}
