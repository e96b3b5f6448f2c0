//! Service registry seam.
//!
//! The forwarder only knows logical service names. A registry turns a name into
//! one concrete backend address per call.

use std::fmt::Debug;
use std::net::SocketAddr;
use thiserror::Error;

use crate::load_balancer::backend::BackendConnectionGuard;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service {0:?} not found")]
    NotFound(String),
    #[error("service {0:?} has no healthy backend")]
    NoHealthyBackend(String),
    #[error("service {0:?} is at its connection limit")]
    Saturated(String),
}

/// A resolved backend address.
///
/// Holding the endpoint keeps the backend's in-flight count raised.
#[derive(Debug)]
pub struct Endpoint {
    pub addr: SocketAddr,
    _lease: Option<BackendConnectionGuard>,
}

impl Endpoint {
    /// An address with no connection accounting.
    pub fn fixed(addr: SocketAddr) -> Self {
        Self { addr, _lease: None }
    }

    pub fn leased(guard: BackendConnectionGuard) -> Self {
        Self {
            addr: guard.addr,
            _lease: Some(guard),
        }
    }
}

/// Resolves logical service names to backend addresses.
pub trait ServiceRegistry: Send + Sync + Debug {
    fn resolve(&self, service: &str) -> Result<Endpoint, RegistryError>;
}
