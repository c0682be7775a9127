//! Service directory subsystem.
//!
//! # Data Flow
//! ```text
//! Node (after a listener is bound)
//!     → Directory::announce(Endpoint)
//!     → Registration (deregister capability)
//!     → pushed onto the node's ReleaseStack
//!
//! Shutdown / failed startup:
//!     ReleaseStack unwinds → Registration::deregister (exactly once)
//! ```
//!
//! # Design Decisions
//! - Deregistration consumes the registration, so it cannot run twice
//! - An unreachable store at startup is fatal; on shutdown it is logged

pub mod etcd;
pub mod memory;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use thiserror::Error;

pub use etcd::EtcdDirectory;
pub use memory::MemoryDirectory;

/// A reachable address announced under a service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub service: String,
    pub address: String,
}

impl Endpoint {
    pub fn new(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.address)
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("directory unreachable: {0}")]
    Unreachable(String),
}

type Deregister = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DirectoryError>> + Send>;

/// Proof of an announcement. Consuming it removes the announcement.
pub struct Registration {
    endpoint: Endpoint,
    deregister: Deregister,
}

impl Registration {
    pub fn new<F, Fut>(endpoint: Endpoint, deregister: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), DirectoryError>> + Send + 'static,
    {
        Self {
            endpoint,
            deregister: Box::new(move || Box::pin(deregister())),
        }
    }

    /// A registration with nothing to undo.
    pub fn noop(endpoint: Endpoint) -> Self {
        Self::new(endpoint, || async { Ok(()) })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn deregister(self) -> Result<(), DirectoryError> {
        (self.deregister)().await
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("endpoint", &self.endpoint).finish()
    }
}

/// External coordination store used for discovery.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn announce(&self, endpoint: &Endpoint) -> Result<Registration, DirectoryError>;
}

/// Directory used when no coordination store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDirectory;

#[async_trait]
impl Directory for NoopDirectory {
    async fn announce(&self, endpoint: &Endpoint) -> Result<Registration, DirectoryError> {
        tracing::debug!(endpoint = %endpoint, "No directory configured, skipping announcement");
        Ok(Registration::noop(endpoint.clone()))
    }
}
