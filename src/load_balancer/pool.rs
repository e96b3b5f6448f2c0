//! Backend pool management.
//!
//! # Responsibilities
//! - Manage collections of backends grouped by service name
//! - Apply the configured load balancing algorithm to select backends
//! - Provide connection guards for tracking

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BackendConfig, LoadBalancingStrategy};
use crate::load_balancer::{
    backend::Backend,
    least_conn::LeastConnections,
    registry::{Endpoint, RegistryError, ServiceRegistry},
    round_robin::RoundRobin,
    LoadBalancer,
};

#[derive(Debug)]
struct ServiceGroup {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

/// Config-backed service registry.
#[derive(Debug)]
pub struct BackendManager {
    groups: HashMap<String, ServiceGroup>,
}

impl BackendManager {
    pub fn new(configs: &[BackendConfig], strategy: LoadBalancingStrategy) -> Self {
        let mut grouped: HashMap<String, Vec<Arc<Backend>>> = HashMap::new();
        for config in configs {
            match config.address.parse() {
                Ok(addr) => {
                    let backend = Backend::new(&config.name, &config.service, addr, config.max_connections);
                    grouped.entry(config.service.clone()).or_default().push(Arc::new(backend));
                }
                Err(_) => tracing::warn!(backend = %config.name, address = %config.address, "Invalid backend address"),
            }
        }

        let groups = grouped
            .into_iter()
            .map(|(service, backends)| {
                let balancer: Box<dyn LoadBalancer> = match strategy {
                    LoadBalancingStrategy::RoundRobin => Box::new(RoundRobin::new()),
                    LoadBalancingStrategy::LeastConnections => Box::new(LeastConnections::new()),
                };
                (service, ServiceGroup { backends, balancer })
            })
            .collect();

        Self { groups }
    }

    /// All backends, for health checking.
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.groups
            .values()
            .flat_map(|group| group.backends.iter())
            .cloned()
            .collect()
    }
}

impl ServiceRegistry for BackendManager {
    fn resolve(&self, service: &str) -> Result<Endpoint, RegistryError> {
        let group = self
            .groups
            .get(service)
            .ok_or_else(|| RegistryError::NotFound(service.to_string()))?;

        let Some(backend) = group.balancer.next_server(&group.backends) else {
            tracing::debug!(service = %service, backends = group.backends.len(), "No healthy backends for service");
            return Err(RegistryError::NoHealthyBackend(service.to_string()));
        };
        backend
            .try_create_guard()
            .map(Endpoint::leased)
            .ok_or_else(|| RegistryError::Saturated(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, service: &str, address: &str) -> BackendConfig {
        BackendConfig {
            name: name.into(),
            service: service.into(),
            address: address.into(),
            max_connections: 1,
        }
    }

    #[test]
    fn resolves_by_service() {
        let manager = BackendManager::new(
            &[
                config("users-1", "user-service", "127.0.0.1:8081"),
                config("orders-1", "order-service", "127.0.0.1:8082"),
            ],
            LoadBalancingStrategy::RoundRobin,
        );

        let endpoint = manager.resolve("user-service").unwrap();
        assert_eq!(endpoint.addr, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(manager.all_backends().len(), 2);
        assert_eq!(
            manager.resolve("billing").unwrap_err(),
            RegistryError::NotFound("billing".into())
        );
    }

    #[test]
    fn lease_counts_against_limit() {
        let manager = BackendManager::new(
            &[config("users-1", "user-service", "127.0.0.1:8081")],
            LoadBalancingStrategy::LeastConnections,
        );

        let held = manager.resolve("user-service").unwrap();
        assert_eq!(
            manager.resolve("user-service").unwrap_err(),
            RegistryError::Saturated("user-service".into())
        );
        drop(held);
        assert!(manager.resolve("user-service").is_ok());
    }

    #[test]
    fn unhealthy_service() {
        let manager = BackendManager::new(
            &[config("users-1", "user-service", "127.0.0.1:8081")],
            LoadBalancingStrategy::RoundRobin,
        );
        manager.all_backends()[0].mark_failure(1);
        assert_eq!(
            manager.resolve("user-service").unwrap_err(),
            RegistryError::NoHealthyBackend("user-service".into())
        );
    }
}
