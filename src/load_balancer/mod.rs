//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → backend service identified
//!     → registry.rs (ServiceRegistry::resolve)
//!     → pool.rs (backends of the service)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!     → backend.rs (reserve a connection slot)
//!     → Return endpoint or RegistryError
//! ```
//!
//! # Design Decisions
//! - Load balancer is stateless apart from its cursor; backends track connections
//! - One algorithm for all services, chosen in config
//! - Unhealthy backends excluded from selection

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod registry;
pub mod round_robin;

use std::sync::Arc;

use backend::Backend;

pub use pool::BackendManager;
pub use registry::{Endpoint, RegistryError, ServiceRegistry};

/// Backend selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
