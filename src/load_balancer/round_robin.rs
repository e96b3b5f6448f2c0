//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        // Skip unhealthy instances, at most one full lap.
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = backends.len();
        (0..len)
            .map(|i| &backends[(start + i) % len])
            .find(|backend| backend.is_healthy())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(port: u16) -> Arc<Backend> {
        Arc::new(Backend::new(format!("b{port}"), "svc", ([127, 0, 0, 1], port).into(), 100))
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let b1 = backend(8080);
        let b2 = backend(8081);
        let backends = vec![b1.clone(), b2.clone()];

        assert_eq!(lb.next_server(&backends).unwrap().addr, b1.addr);
        assert_eq!(lb.next_server(&backends).unwrap().addr, b2.addr);
        assert_eq!(lb.next_server(&backends).unwrap().addr, b1.addr);
    }

    #[test]
    fn test_skips_unhealthy() {
        let lb = RoundRobin::new();
        let b1 = backend(8080);
        let b2 = backend(8081);
        b1.mark_failure(1);
        let backends = vec![b1, b2.clone()];

        for _ in 0..3 {
            assert_eq!(lb.next_server(&backends).unwrap().addr, b2.addr);
        }
        b2.mark_failure(1);
        assert!(lb.next_server(&backends).is_none());
    }
}
