//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Ordered route definitions. First match wins.
    pub routes: Vec<RouteConfig>,

    /// Service instances known to the built-in registry.
    pub backends: Vec<BackendConfig>,

    /// Load-balancing strategy used by the built-in registry.
    pub load_balancer: LoadBalancerConfig,

    /// Fallback endpoints served by the gateway itself.
    pub fallbacks: Vec<FallbackConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only admin endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size, also the bound for bodies buffered for retries.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Route configuration mapping request paths to a backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Unique route identifier for logging/metrics.
    pub id: String,

    /// Path patterns; the route matches if any of them does.
    #[serde(alias = "paths")]
    pub path_patterns: Vec<String>,

    /// Route-level path rewrite.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,

    /// Logical backend service (`lb://user-service` or `user-service`).
    pub backend_service: String,

    /// Ordered filter chain.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl RouteConfig {
    /// The circuit breaker filter, if any.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerConfig> {
        self.filters.iter().find_map(|f| match f {
            FilterConfig::CircuitBreaker(cb) => Some(cb),
            _ => None,
        })
    }

    /// The retry filter, if any.
    pub fn retry(&self) -> Option<&RetryConfig> {
        self.filters.iter().find_map(|f| match f {
            FilterConfig::Retry(r) => Some(r),
            _ => None,
        })
    }

    /// The effective rewrite rule: route-level first, then a `rewrite_path` filter.
    pub fn rewrite_rule(&self) -> Option<&RewriteConfig> {
        self.rewrite.as_ref().or_else(|| {
            self.filters.iter().find_map(|f| match f {
                FilterConfig::RewritePath(r) => Some(r),
                _ => None,
            })
        })
    }
}

/// A single entry of a route's filter chain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    CircuitBreaker(CircuitBreakerConfig),
    Retry(RetryConfig),
    RewritePath(RewriteConfig),
}

/// Regex path rewrite, `${name}` references capture groups.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RewriteConfig {
    pub pattern: String,
    pub replacement: String,
}

/// Circuit breaker filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Breaker name. Routes using the same name share one state machine.
    pub name: String,

    /// Fallback endpoint served while the breaker rejects traffic.
    #[serde(default)]
    pub fallback_path: Option<String>,

    /// Failures within the window that trip the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Number of most recent outcomes considered.
    #[serde(default = "default_window_size")]
    pub window_size: u32,

    /// Time spent open before admitting trial requests, in milliseconds.
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,

    /// Trial requests admitted while half-open.
    #[serde(default = "default_half_open_trial_count")]
    pub half_open_trial_count: u32,
}

impl CircuitBreakerConfig {
    /// Breaker with default thresholds.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallback_path: None,
            failure_threshold: default_failure_threshold(),
            window_size: default_window_size(),
            open_duration_ms: default_open_duration_ms(),
            half_open_trial_count: default_half_open_trial_count(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_window_size() -> u32 {
    3
}

fn default_open_duration_ms() -> u64 {
    10_000
}

fn default_half_open_trial_count() -> u32 {
    1
}

/// Retry filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Relative jitter in [0, 1] applied around the computed delay.
    pub jitter: f64,

    /// Backend statuses that are retried.
    pub retryable_status_codes: Vec<u16>,

    /// Also retry POST/PATCH and other non-idempotent methods.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            multiplier: 2.0,
            jitter: 0.1,
            retryable_status_codes: vec![500, 502, 503, 504],
            retry_non_idempotent: false,
        }
    }
}

/// Service instance known to the built-in registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique instance identifier.
    pub name: String,

    /// Logical service this instance belongs to.
    #[serde(alias = "group")]
    pub service: String,

    /// Instance address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Maximum concurrent requests to this instance.
    #[serde(default = "default_max_backend_conns")]
    pub max_connections: usize,
}

fn default_max_backend_conns() -> usize {
    100
}

/// Load-balancing algorithm for the built-in registry.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    LeastConnections,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub strategy: LoadBalancingStrategy,
}

/// A fallback endpoint and the service label used in its message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Path served by the gateway, e.g. "/fallback/users".
    pub path: String,

    /// Human readable service name, e.g. "User Service".
    pub service: String,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Per-attempt backend call timeout in milliseconds.
    pub upstream_ms: u64,

    /// Whole-request deadline (all attempts and backoff) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            upstream_ms: 10_000,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Expose the read-only actuator endpoints.
    pub enabled: bool,

    /// Path prefix for the admin endpoints.
    pub base_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_path: "/actuator".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters_from_toml() {
        let raw = r#"
            [[routes]]
            id = "user-service"
            paths = ["/api/users/**"]
            backend_service = "lb://user-service"
            filters = [
                { type = "circuit_breaker", name = "userServiceCircuitBreaker", fallback_path = "/fallback/users" },
                { type = "retry", max_attempts = 3 },
            ]
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        let route = &config.routes[0];

        let cb = route.circuit_breaker().unwrap();
        assert_eq!(cb.name, "userServiceCircuitBreaker");
        assert_eq!(cb.fallback_path.as_deref(), Some("/fallback/users"));
        assert_eq!(cb.failure_threshold, 3);
        assert_eq!(cb.half_open_trial_count, 1);

        let retry = route.retry().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay_ms, 100);
        assert_eq!(retry.retryable_status_codes, vec![500, 502, 503, 504]);
        assert!(route.rewrite_rule().is_none());
    }

    #[test]
    fn rewrite_filter_is_effective_rule() {
        let raw = r#"
            [[routes]]
            id = "swagger"
            path_patterns = ["/user-service/v3/api-docs/**"]
            backend_service = "user-service"

            [[routes.filters]]
            type = "rewrite_path"
            pattern = "/user-service/(?<segment>.*)"
            replacement = "/${segment}"
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        let rule = config.routes[0].rewrite_rule().unwrap();
        assert_eq!(rule.replacement, "/${segment}");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.routes.is_empty());
        assert_eq!(config.load_balancer.strategy, LoadBalancingStrategy::RoundRobin);
        assert!(config.admin.enabled);
        assert!(!config.health_check.enabled);
    }
}
