//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Least connections selector.
/// Selects the healthy backend with the fewest in-flight requests.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // Ties go to the first backend
        backends
            .iter()
            .filter(|b| b.is_healthy())
            .min_by_key(|b| b.active())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let b1 = Arc::new(Backend::new("a", "svc", "127.0.0.1:8080".parse().unwrap(), 100));
        let b2 = Arc::new(Backend::new("b", "svc", "127.0.0.1:8081".parse().unwrap(), 100));
        let backends = vec![b1.clone(), b2.clone()];

        let _g1 = b1.try_create_guard().unwrap();
        assert_eq!(lb.next_server(&backends).unwrap().addr, b2.addr);

        let _g2 = b2.try_create_guard().unwrap();
        let _g3 = b2.try_create_guard().unwrap();
        assert_eq!(lb.next_server(&backends).unwrap().addr, b1.addr);

        b1.mark_failure(1);
        assert_eq!(lb.next_server(&backends).unwrap().addr, b2.addr);
    }
}
