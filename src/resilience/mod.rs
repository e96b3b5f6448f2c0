//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route with filters:
//!     → retries.rs (one attempt per loop iteration, backoff between attempts)
//!         → circuit_breaker.rs (admit or reject before every attempt)
//!         → forwarder call
//!         → outcome.rs (classify result, settle the breaker permit)
//!     → On terminal failure: fallback.rs (503 JSON) when the route has a breaker
//! ```
//!
//! # Design Decisions
//! - Retries only for idempotent requests (GET, HEAD, etc.) unless a route opts in
//! - 4xx never retried and never counted against a breaker
//! - Breakers are shared by name through registry.rs
//! - Per-call timeouts live in the forwarder; the overall deadline is a tower layer

pub mod backoff;
pub mod circuit_breaker;
pub mod fallback;
pub mod outcome;
pub mod registry;
pub mod retries;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{BreakerSettings, BreakerSnapshot, BreakerState, CircuitBreaker, Permit};
pub use fallback::{FallbackBody, FallbackDispatcher};
pub use outcome::RequestOutcome;
pub use registry::{BreakerConflict, BreakerRegistry};
pub use retries::{RetryExecutor, RetryFailure, RetryPolicy};
