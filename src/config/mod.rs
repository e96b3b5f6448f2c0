//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into RouteTable / BreakerRegistry / BackendManager at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breaker state lives for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, CircuitBreakerConfig, FallbackConfig, FilterConfig,
    GatewayConfig, HealthCheckConfig, ListenerConfig, LoadBalancerConfig, LoadBalancingStrategy,
    LogFormat, ObservabilityConfig, RetryConfig, RewriteConfig, RouteConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
