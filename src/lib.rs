//! Edge gateway: route table, circuit breakers, retries and fallbacks in front
//! of load-balanced HTTP services.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
