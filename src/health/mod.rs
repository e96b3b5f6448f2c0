//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend's health path
//!     → Backend::mark_success / mark_failure
//!     → Unhealthy backends skipped by the load balancer
//! ```
//!
//! # Design Decisions
//! - Disabled by default; the circuit breakers already react to request failures
//! - State transitions require consecutive successes/failures
//! - Health state is per-backend, not per-service

pub mod active;

pub use active::HealthMonitor;
