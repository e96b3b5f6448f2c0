use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;
use crate::routing::Route;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RouteView {
    pub id: String,
    pub path_patterns: Vec<String>,
    pub backend_service: String,
    pub rewrite: Option<RewriteView>,
    pub circuit_breaker: Option<String>,
    pub fallback_path: Option<String>,
    pub max_attempts: u32,
}

#[derive(Debug, Serialize)]
pub struct RewriteView {
    pub pattern: String,
    pub replacement: String,
}

impl From<&Route> for RouteView {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id.clone(),
            path_patterns: route.patterns.iter().map(|p| p.as_str().to_string()).collect(),
            backend_service: route.backend_service.clone(),
            rewrite: route.rewrite.as_ref().map(|r| RewriteView {
                pattern: r.pattern().to_string(),
                replacement: r.replacement().to_string(),
            }),
            circuit_breaker: route.breaker().map(|b| b.name().to_string()),
            fallback_path: route.fallback_path().map(str::to_string),
            max_attempts: route.retry.max_attempts(),
        }
    }
}

pub async fn get_health() -> Json<SystemStatus> {
    Json(SystemStatus {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteView>> {
    Json(state.routes.routes().iter().map(RouteView::from).collect())
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
