//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → routing (route table lookup, path rewrite)
//!     → resilience (retry executor, circuit breaker)
//!     → forwarder.rs (registry lookup, backend call, per-call timeout)
//!     → response.rs (strip hop-by-hop headers, map errors)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::ProxyForwarder;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
