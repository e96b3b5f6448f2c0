//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend health state based on results

use axum::body::Body;
use axum::http::{header, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::{Backend, HealthState};
use crate::load_balancer::pool::BackendManager;
use crate::observability::metrics;

pub struct HealthMonitor {
    backends: Arc<BackendManager>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(backends: Arc<BackendManager>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            backends,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.check_all().await,
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for backend in self.backends.all_backends() {
            let healthy = self.probe(&backend).await;
            let transition = if healthy {
                backend.mark_success(self.config.healthy_threshold as usize)
            } else {
                backend.mark_failure(self.config.unhealthy_threshold as usize)
            };

            match transition {
                Some(HealthState::Unhealthy) => {
                    tracing::warn!(backend = %backend.name, service = %backend.service, "Backend marked unhealthy")
                }
                Some(state) => {
                    tracing::info!(backend = %backend.name, service = %backend.service, state = ?state, "Backend health changed")
                }
                None => {}
            }
            metrics::record_backend_health(&backend.name, &backend.service, backend.is_healthy());
        }
    }

    async fn probe(&self, backend: &Backend) -> bool {
        let request = match Request::get(format!("http://{}{}", backend.addr, self.config.path))
            .header(header::USER_AGENT, "edge-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %backend.name, error = %e, "Failed to build health check request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => true,
            Ok(Ok(response)) => {
                tracing::debug!(backend = %backend.name, status = %response.status(), "Health check failed: non-success status");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.name, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.name, "Health check failed: timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, LoadBalancingStrategy};
    use crate::load_balancer::ServiceRegistry;

    #[tokio::test]
    async fn refused_backend_goes_unhealthy() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let manager = Arc::new(BackendManager::new(
            &[BackendConfig {
                name: "users-1".into(),
                service: "user-service".into(),
                address: addr.to_string(),
                max_connections: 10,
            }],
            LoadBalancingStrategy::RoundRobin,
        ));
        let config = HealthCheckConfig {
            enabled: true,
            timeout_secs: 1,
            unhealthy_threshold: 2,
            ..HealthCheckConfig::default()
        };
        let monitor = HealthMonitor::new(manager.clone(), config);

        monitor.check_all().await;
        assert!(manager.resolve("user-service").is_ok());
        monitor.check_all().await;
        assert!(manager.resolve("user-service").is_err());
    }
}
