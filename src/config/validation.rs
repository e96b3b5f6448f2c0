//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference known services)
//! - Validate value ranges (thresholds, jitter, delays)
//! - Enforce per-route filter invariants
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use thiserror::Error;

use crate::admin;
use crate::config::schema::{CircuitBreakerConfig, FilterConfig, GatewayConfig, RetryConfig};
use crate::routing::matcher::PathPattern;
use crate::routing::router::service_name;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid listener address {0:?}")]
    InvalidBindAddress(String),

    #[error("duplicate route id {0:?}")]
    DuplicateRouteId(String),

    #[error("route {0:?} has no path patterns")]
    NoPathPatterns(String),

    #[error("route {route:?}: invalid path pattern {pattern:?}")]
    InvalidPathPattern { route: String, pattern: String },

    #[error("route {route:?}: invalid rewrite pattern {pattern:?}")]
    InvalidRewrite { route: String, pattern: String },

    #[error("route {route:?}: more than one {filter} filter")]
    DuplicateFilter { route: String, filter: &'static str },

    #[error("route {route:?}: {reason}")]
    InvalidFilter { route: String, reason: String },

    #[error("circuit breaker {0:?} is declared with conflicting settings")]
    ConflictingBreaker(String),

    #[error("route {route:?} references unknown service {service:?}")]
    UnknownService { route: String, service: String },

    #[error("backend {name:?}: invalid address {address:?}")]
    InvalidBackendAddress { name: String, address: String },

    #[error("fallback path {0:?} must be a literal path below '/'")]
    InvalidFallbackPath(String),

    #[error("fallback path {0:?} is already served by an admin endpoint")]
    FallbackShadowsAdmin(String),
}

/// Fallback paths are served as plain GET routes.
fn is_fallback_path(path: &str) -> bool {
    path.len() > 1
        && path.starts_with('/')
        && !path.contains(['{', '}', '*', '?'])
        && !path.split('/').any(|segment| segment.starts_with(':'))
}

fn check_fallback_path(path: &str, admin_paths: &[String], errors: &mut Vec<ValidationError>) {
    if !is_fallback_path(path) {
        errors.push(ValidationError::InvalidFallbackPath(path.to_string()));
    } else if admin_paths.iter().any(|p| p == path) {
        errors.push(ValidationError::FallbackShadowsAdmin(path.to_string()));
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    for backend in &config.backends {
        if backend.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            });
        }
    }

    let admin_paths: Vec<String> = if config.admin.enabled {
        admin::endpoint_paths(&config.admin.base_path).into()
    } else {
        Vec::new()
    };
    for fallback in &config.fallbacks {
        check_fallback_path(&fallback.path, &admin_paths, &mut errors);
    }

    let services: HashSet<&str> = config.backends.iter().map(|b| b.service.as_str()).collect();
    let mut route_ids = HashSet::new();
    let mut breakers: HashMap<&str, &CircuitBreakerConfig> = HashMap::new();

    for route in &config.routes {
        if !route_ids.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRouteId(route.id.clone()));
        }

        if route.path_patterns.is_empty() {
            errors.push(ValidationError::NoPathPatterns(route.id.clone()));
        }
        for pattern in &route.path_patterns {
            if PathPattern::parse(pattern).is_err() {
                errors.push(ValidationError::InvalidPathPattern {
                    route: route.id.clone(),
                    pattern: pattern.clone(),
                });
            }
        }

        match service_name(&route.backend_service) {
            Some(service) if services.contains(service.as_str()) => {}
            Some(service) => errors.push(ValidationError::UnknownService {
                route: route.id.clone(),
                service,
            }),
            None => errors.push(ValidationError::UnknownService {
                route: route.id.clone(),
                service: route.backend_service.clone(),
            }),
        }

        check_filter_counts(&route.id, route.rewrite.is_some(), &route.filters, &mut errors);

        if let Some(rule) = route.rewrite_rule() {
            if regex::Regex::new(&rule.pattern).is_err() {
                errors.push(ValidationError::InvalidRewrite {
                    route: route.id.clone(),
                    pattern: rule.pattern.clone(),
                });
            }
        }

        if let Some(cb) = route.circuit_breaker() {
            check_breaker(&route.id, cb, &mut errors);
            if let Some(path) = cb.fallback_path.as_deref() {
                check_fallback_path(path, &admin_paths, &mut errors);
            }
            match breakers.get(cb.name.as_str()) {
                Some(existing) if !same_breaker_settings(existing, cb) => {
                    errors.push(ValidationError::ConflictingBreaker(cb.name.clone()));
                }
                Some(_) => {}
                None => {
                    breakers.insert(cb.name.as_str(), cb);
                }
            }
        }

        if let Some(retry) = route.retry() {
            check_retry(&route.id, retry, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_filter_counts(
    route: &str,
    has_route_rewrite: bool,
    filters: &[FilterConfig],
    errors: &mut Vec<ValidationError>,
) {
    let mut breakers = 0;
    let mut retries = 0;
    let mut rewrites = usize::from(has_route_rewrite);
    for filter in filters {
        match filter {
            FilterConfig::CircuitBreaker(_) => breakers += 1,
            FilterConfig::Retry(_) => retries += 1,
            FilterConfig::RewritePath(_) => rewrites += 1,
        }
    }
    for (count, filter) in [(breakers, "circuit_breaker"), (retries, "retry"), (rewrites, "rewrite")] {
        if count > 1 {
            errors.push(ValidationError::DuplicateFilter {
                route: route.to_string(),
                filter,
            });
        }
    }
}

fn check_breaker(route: &str, cb: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    let mut invalid = |reason: String| {
        errors.push(ValidationError::InvalidFilter {
            route: route.to_string(),
            reason,
        })
    };
    if cb.name.is_empty() {
        invalid("circuit breaker name must not be empty".into());
    }
    if cb.window_size == 0 {
        invalid("window_size must be at least 1".into());
    }
    if cb.failure_threshold == 0 || cb.failure_threshold > cb.window_size {
        invalid(format!(
            "failure_threshold must be within 1..={} (window_size)",
            cb.window_size
        ));
    }
    if cb.half_open_trial_count == 0 {
        invalid("half_open_trial_count must be at least 1".into());
    }
    if cb.open_duration_ms == 0 {
        invalid("open_duration_ms must be positive".into());
    }
}

fn check_retry(route: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    let mut invalid = |reason: String| {
        errors.push(ValidationError::InvalidFilter {
            route: route.to_string(),
            reason,
        })
    };
    if retry.max_attempts == 0 {
        invalid("max_attempts must be at least 1".into());
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        invalid(format!("jitter {} outside [0, 1]", retry.jitter));
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        invalid(format!("multiplier {} must be >= 1", retry.multiplier));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        invalid("base_delay_ms exceeds max_delay_ms".into());
    }
    for code in &retry.retryable_status_codes {
        if !(500..=599).contains(code) {
            invalid(format!("retryable status {} is not a 5xx code", code));
        }
    }
}

/// Two declarations of a breaker name agree on everything but the fallback path.
fn same_breaker_settings(a: &CircuitBreakerConfig, b: &CircuitBreakerConfig) -> bool {
    a.failure_threshold == b.failure_threshold
        && a.window_size == b.window_size
        && a.open_duration_ms == b.open_duration_ms
        && a.half_open_trial_count == b.half_open_trial_count
}
