//! Breaker registry.
//!
//! Breakers are keyed by name so that every route naming the same breaker shares
//! one state machine. Entries are created while the route table is compiled and
//! live for the rest of the process.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker};

/// A breaker name was registered twice with different thresholds.
#[derive(Debug, Error)]
#[error("circuit breaker {name:?} already registered with different settings")]
pub struct BreakerConflict {
    pub name: String,
}

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker registered under `name`, creating it if needed.
    pub fn get_or_create(
        &self,
        name: &str,
        settings: BreakerSettings,
    ) -> Result<Arc<CircuitBreaker>, BreakerConflict> {
        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().settings() == &settings {
                    Ok(entry.get().clone())
                } else {
                    Err(BreakerConflict {
                        name: name.to_string(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                let breaker = Arc::new(CircuitBreaker::new(name, settings));
                entry.insert(breaker.clone());
                metrics::record_breaker_registered(name);
                tracing::debug!(breaker = %name, "Circuit breaker registered");
                Ok(breaker)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|entry| entry.value().clone()).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_name_shares_instance() {
        let registry = BreakerRegistry::new();
        let a = registry.get_or_create("users", BreakerSettings::default()).unwrap();
        let b = registry.get_or_create("users", BreakerSettings::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&a, &registry.get("users").unwrap()));
    }

    #[test]
    fn conflicting_settings_rejected() {
        let registry = BreakerRegistry::new();
        registry.get_or_create("users", BreakerSettings::default()).unwrap();

        let mut other = BreakerSettings::default();
        other.open_duration = Duration::from_secs(1);
        let err = registry.get_or_create("users", other).unwrap_err();
        assert_eq!(err.name, "users");
    }

    #[test]
    fn snapshots_sorted_by_name() {
        let registry = BreakerRegistry::new();
        for name in ["orders", "billing", "users"] {
            registry.get_or_create(name, BreakerSettings::default()).unwrap();
        }
        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["billing", "orders", "users"]);
    }
}
