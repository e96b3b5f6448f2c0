//! Read-only admin endpoints.
//!
//! Mounted under `admin.base_path` (default `/actuator`):
//! - `GET {base}/health`: liveness
//! - `GET {base}/gateway/routes`: compiled route table
//! - `GET {base}/circuitbreakers`: breaker snapshots

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

const HEALTH: &str = "/health";
const ROUTES: &str = "/gateway/routes";
const CIRCUIT_BREAKERS: &str = "/circuitbreakers";

/// Full paths of the admin endpoints under `base_path`.
pub fn endpoint_paths(base_path: &str) -> [String; 3] {
    let base = base_path.trim_end_matches('/');
    [HEALTH, ROUTES, CIRCUIT_BREAKERS].map(|suffix| format!("{base}{suffix}"))
}

pub fn router(base_path: &str) -> Router<AppState> {
    let [health, routes, breakers] = endpoint_paths(base_path);
    Router::new()
        .route(&health, get(get_health))
        .route(&routes, get(get_routes))
        .route(&breakers, get(get_circuit_breakers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_ignore_trailing_slash() {
        assert_eq!(endpoint_paths("/actuator/"), endpoint_paths("/actuator"));
        assert_eq!(endpoint_paths("/ops")[1], "/ops/gateway/routes");
    }
}
