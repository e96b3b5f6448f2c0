//! Retry logic.
//!
//! # Responsibilities
//! - Determine if an attempt is retryable (connection failures, configured 5xx)
//! - Execute retries with exponential backoff + jitter
//! - Feed every attempt's outcome to the route's circuit breaker
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent) unless the route opts in
//! - Never retry 4xx
//! - The breaker is consulted before every attempt, not just the first, and
//!   again before each backoff sleep
//! - Gateway-local refusals (`GatewayBusy`) are neither retried nor recorded
//! - Backoff sleeps on the Tokio timer; dropping the future cancels the sequence

use axum::body::Body;
use axum::http::{Method, Response, StatusCode};
use std::future::Future;
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::error::{ErrorKind, GatewayError};
use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::resilience::outcome::RequestOutcome;

/// Which outcomes are retried and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub backoff: BackoffPolicy,
    retryable_status_codes: Vec<StatusCode>,
    retry_non_idempotent: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            backoff: BackoffPolicy::from_config(config),
            retryable_status_codes: config
                .retryable_status_codes
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok())
                .collect(),
            retry_non_idempotent: config.retry_non_idempotent,
        }
    }

    /// Policy for routes without a retry filter.
    pub fn single_attempt() -> Self {
        let mut policy = Self::from_config(&RetryConfig::default());
        policy.backoff.max_attempts = 1;
        policy
    }

    pub fn max_attempts(&self) -> u32 {
        self.backoff.max_attempts
    }

    /// Attempts allowed for a request with this method.
    pub fn attempts_for(&self, method: &Method) -> u32 {
        if method.is_idempotent() || self.retry_non_idempotent {
            self.backoff.max_attempts
        } else {
            1
        }
    }

    pub fn is_retryable(&self, outcome: &RequestOutcome) -> bool {
        match outcome.error_kind {
            Some(ErrorKind::BackendUnreachable) => true,
            Some(ErrorKind::BackendError) => outcome
                .status
                .map(|s| self.retryable_status_codes.contains(&s))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Terminal failure of a retried call.
#[derive(Debug)]
pub struct RetryFailure {
    /// `RetriesExhausted`, `BreakerOpen`, or the non-retryable failure itself.
    pub error: GatewayError,
    /// Backend response of the last attempt, when there was one.
    pub last_response: Option<Response<Body>>,
    /// Attempts that actually reached the forwarder.
    pub attempts: u32,
}

/// Runs one logical backend call under a retry policy and an optional breaker.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor<'a> {
    policy: &'a RetryPolicy,
    breaker: Option<&'a CircuitBreaker>,
    route_id: &'a str,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(route_id: &'a str, policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            breaker: None,
            route_id,
        }
    }

    pub fn with_breaker(mut self, breaker: Option<&'a CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Call `attempt` until it succeeds, fails terminally, or the budget is spent.
    ///
    /// `attempt` receives the 1-based attempt number and returns the forwarder
    /// result: any backend response as `Ok`, connection failures as `Err`.
    pub async fn execute<F, Fut>(&self, method: &Method, mut attempt: F) -> Result<Response<Body>, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Response<Body>, GatewayError>>,
    {
        let max_attempts = self.policy.attempts_for(method);
        let mut number = 0;

        loop {
            number += 1;

            let permit = match self.breaker.map(CircuitBreaker::try_acquire).transpose() {
                Ok(permit) => permit,
                Err(error) => {
                    tracing::debug!(route = %self.route_id, attempt = number, "Breaker rejected attempt");
                    return Err(RetryFailure {
                        error,
                        last_response: None,
                        attempts: number - 1,
                    });
                }
            };

            let started = Instant::now();
            let result = attempt(number).await;
            let outcome = RequestOutcome::from_result(&result, started.elapsed());
            // An unsettled permit leaves the window untouched.
            if outcome.reached_backend() {
                if let Some(permit) = permit {
                    permit.record(&outcome);
                }
                metrics::record_backend_attempt(self.route_id, &outcome);
            }

            if !outcome.is_breaker_failure() {
                return result.map_err(|error| RetryFailure {
                    error,
                    last_response: None,
                    attempts: number,
                });
            }

            let retryable = self.policy.is_retryable(&outcome);
            let kind = outcome.error_kind.unwrap_or(ErrorKind::BackendError);

            if retryable && number < max_attempts {
                let delay = self.policy.backoff.delay(number);
                // Release the failed response's connection before sleeping.
                drop(result);
                if let Some(breaker) = self.breaker.filter(|b| b.state() == BreakerState::Open) {
                    tracing::debug!(route = %self.route_id, attempt = number, "Breaker opened, abandoning retries");
                    return Err(RetryFailure {
                        error: GatewayError::BreakerOpen {
                            name: breaker.name().to_string(),
                        },
                        last_response: None,
                        attempts: number,
                    });
                }
                tracing::info!(
                    route = %self.route_id,
                    attempt = number,
                    delay = ?delay,
                    status = ?outcome.status,
                    error = %kind,
                    "Retrying backend call"
                );
                metrics::record_retry(self.route_id);
                tokio::time::sleep(delay).await;
                continue;
            }

            let exhausted = || GatewayError::RetriesExhausted {
                attempts: number,
                last: kind,
            };
            let (error, last_response) = match result {
                Ok(response) => {
                    let error = if retryable {
                        exhausted()
                    } else {
                        GatewayError::BackendError {
                            status: response.status(),
                        }
                    };
                    (error, Some(response))
                }
                Err(error) => (if retryable { exhausted() } else { error }, None),
            };

            tracing::warn!(
                route = %self.route_id,
                attempts = number,
                error = %error,
                "Backend call failed"
            );
            return Err(RetryFailure {
                error,
                last_response,
                attempts: number,
            });
        }
    }
}
