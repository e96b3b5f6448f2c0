//! Route lookup.
//!
//! # Responsibilities
//! - Compile route configs into an immutable route table
//! - Bind each route to its shared circuit breaker and retry policy
//! - Look up the first route matching a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) pattern scan in configuration order (acceptable for typical route counts)
//! - Explicit NoRouteMatched rather than silent default

use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::RouteConfig;
use crate::error::GatewayError;
use crate::resilience::{BreakerConflict, BreakerRegistry, BreakerSettings, CircuitBreaker, RetryPolicy};
use crate::routing::matcher::{PathPattern, PatternError};
use crate::routing::rewrite::RewriteRule;

const LOAD_BALANCED_SCHEME: &str = "lb";

/// Logical service name of a route target: `lb://user-service` or `user-service`.
pub fn service_name(target: &str) -> Option<String> {
    if target.contains("://") {
        let url = Url::parse(target).ok()?;
        if url.scheme() != LOAD_BALANCED_SCHEME {
            return None;
        }
        return url.host_str().filter(|h| !h.is_empty()).map(str::to_string);
    }
    let valid = !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then(|| target.to_string())
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {route:?}: invalid path pattern {pattern:?}: {source}")]
    Pattern {
        route: String,
        pattern: String,
        source: PatternError,
    },
    #[error("route {route:?}: invalid rewrite: {source}")]
    Rewrite { route: String, source: regex::Error },
    #[error("route {route:?}: invalid backend service {target:?}")]
    Backend { route: String, target: String },
    #[error(transparent)]
    Breaker(#[from] BreakerConflict),
}

/// Breaker binding of a route.
#[derive(Debug, Clone)]
pub struct RouteBreaker {
    pub breaker: Arc<CircuitBreaker>,
    pub fallback_path: Option<String>,
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub patterns: Vec<PathPattern>,
    pub rewrite: Option<RewriteRule>,
    /// Logical service name, without the `lb://` scheme.
    pub backend_service: String,
    pub breaker: Option<RouteBreaker>,
    /// Single-attempt policy when the route has no retry filter.
    pub retry: RetryPolicy,
}

impl Route {
    fn compile(config: &RouteConfig, breakers: &BreakerRegistry) -> Result<Self, RouteError> {
        let patterns = config
            .path_patterns
            .iter()
            .map(|pattern| {
                PathPattern::parse(pattern).map_err(|source| RouteError::Pattern {
                    route: config.id.clone(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rewrite = config
            .rewrite_rule()
            .map(|rule| RewriteRule::new(&rule.pattern, &rule.replacement))
            .transpose()
            .map_err(|source| RouteError::Rewrite {
                route: config.id.clone(),
                source,
            })?;

        let backend_service = service_name(&config.backend_service).ok_or_else(|| RouteError::Backend {
            route: config.id.clone(),
            target: config.backend_service.clone(),
        })?;

        let breaker = match config.circuit_breaker() {
            Some(cb) => Some(RouteBreaker {
                breaker: breakers.get_or_create(&cb.name, BreakerSettings::from(cb))?,
                fallback_path: cb.fallback_path.clone(),
            }),
            None => None,
        };

        let retry = config
            .retry()
            .map(RetryPolicy::from_config)
            .unwrap_or_else(RetryPolicy::single_attempt);

        Ok(Self {
            id: config.id.clone(),
            patterns,
            rewrite,
            backend_service,
            breaker,
            retry,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref().map(|b| b.breaker.as_ref())
    }

    pub fn fallback_path(&self) -> Option<&str> {
        self.breaker.as_ref().and_then(|b| b.fallback_path.as_deref())
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Request path after the route's rewrite, without query string.
    pub outbound_path: String,
}

/// Ordered, immutable route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_config(routes: &[RouteConfig], breakers: &BreakerRegistry) -> Result<Self, RouteError> {
        let routes = routes
            .iter()
            .map(|config| Route::compile(config, breakers))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(routes = routes.len(), breakers = breakers.len(), "Route table compiled");
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route, in configuration order, with a pattern matching `path`.
    pub fn match_path(&self, path: &str) -> Result<RouteMatch<'_>, GatewayError> {
        let route = self
            .routes
            .iter()
            .find(|route| route.matches(path))
            .ok_or_else(|| GatewayError::NoRouteMatched {
                path: path.to_string(),
            })?;
        let outbound_path = match &route.rewrite {
            Some(rule) => rule.apply(path),
            None => path.to_string(),
        };
        Ok(RouteMatch { route, outbound_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, FilterConfig, RetryConfig, RewriteConfig};

    fn route(id: &str, patterns: &[&str], filters: Vec<FilterConfig>) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            path_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            rewrite: None,
            backend_service: "lb://user-service".to_string(),
            filters,
        }
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("lb://user-service").as_deref(), Some("user-service"));
        assert_eq!(service_name("user-service").as_deref(), Some("user-service"));
        assert_eq!(service_name("http://user-service"), None);
        assert_eq!(service_name(""), None);
        assert_eq!(service_name("lb://"), None);
        assert_eq!(service_name("user service"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let registry = BreakerRegistry::new();
        let table = RouteTable::from_config(
            &[
                route("specific", &["/api/users/admin"], vec![]),
                route("users", &["/api/users/**"], vec![]),
                route("shadowed", &["/api/users/admin"], vec![]),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(table.match_path("/api/users/admin").unwrap().route.id, "specific");
        assert_eq!(table.match_path("/api/users/7").unwrap().route.id, "users");
        assert!(matches!(
            table.match_path("/api/orders"),
            Err(GatewayError::NoRouteMatched { path }) if path == "/api/orders"
        ));
    }

    #[test]
    fn test_rewrite_applied() {
        let registry = BreakerRegistry::new();
        let swagger = route(
            "user-service-swagger",
            &["/user-service/v3/api-docs/**", "/user-service/swagger-ui/**"],
            vec![FilterConfig::RewritePath(RewriteConfig {
                pattern: "/user-service/(?<segment>.*)".into(),
                replacement: "/${segment}".into(),
            })],
        );
        let table = RouteTable::from_config(&[swagger], &registry).unwrap();

        let m = table.match_path("/user-service/swagger-ui/index.html").unwrap();
        assert_eq!(m.outbound_path, "/swagger-ui/index.html");
        let m = table.match_path("/user-service/v3/api-docs").unwrap();
        assert_eq!(m.outbound_path, "/v3/api-docs");
    }

    #[test]
    fn test_routes_share_breakers_by_name() {
        let registry = BreakerRegistry::new();
        let mut cb = CircuitBreakerConfig::named("shared");
        cb.fallback_path = Some("/fallback/users".into());
        let table = RouteTable::from_config(
            &[
                route("a", &["/a/**"], vec![FilterConfig::CircuitBreaker(cb.clone())]),
                route(
                    "b",
                    &["/b/**"],
                    vec![FilterConfig::CircuitBreaker(cb), FilterConfig::Retry(RetryConfig::default())],
                ),
            ],
            &registry,
        )
        .unwrap();

        let a = table.routes()[0].breaker.as_ref().unwrap();
        let b = table.routes()[1].breaker.as_ref().unwrap();
        assert!(Arc::ptr_eq(&a.breaker, &b.breaker));
        assert_eq!(registry.len(), 1);
        assert_eq!(table.routes()[0].retry.max_attempts(), 1);
        assert_eq!(table.routes()[1].retry.max_attempts(), 3);
        assert_eq!(table.routes()[1].fallback_path(), Some("/fallback/users"));
    }

    #[test]
    fn test_compile_errors() {
        let registry = BreakerRegistry::new();
        let err = RouteTable::from_config(&[route("bad", &["nope"], vec![])], &registry).unwrap_err();
        assert!(matches!(err, RouteError::Pattern { .. }));

        let mut other = CircuitBreakerConfig::named("x");
        other.window_size = 10;
        let err = RouteTable::from_config(
            &[
                route("a", &["/a"], vec![FilterConfig::CircuitBreaker(CircuitBreakerConfig::named("x"))]),
                route("b", &["/b"], vec![FilterConfig::CircuitBreaker(other)]),
            ],
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, RouteError::Breaker(_)));
    }
}
