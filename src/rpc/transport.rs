//! The RPC transport services register into.
//!
//! Services are axum routers merged into one router, which is then
//! wrapped with the transport-level layers: quota charging, request size
//! cap, request ids and tracing.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use std::error::Error as StdError;
use std::net::SocketAddr;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::extension::Registry;
use crate::rpc::quota::{charge_quota, QuotaGate};

pub type RegistrationError = Box<dyn StdError + Send + Sync>;

/// A bound RPC listener awaiting services.
pub struct RpcTransport {
    local_addr: SocketAddr,
    router: Router,
    services: Vec<String>,
}

impl RpcTransport {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            router: Router::new(),
            services: Vec::new(),
        }
    }

    /// Address the RPC listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Merge `routes` into the transport. Overlapping paths panic inside
    /// axum, so services must own distinct prefixes.
    pub fn add_service(&mut self, name: impl Into<String>, routes: Router) {
        let name = name.into();
        tracing::debug!(service = %name, "Registering RPC service");
        self.router = std::mem::take(&mut self.router).merge(routes);
        self.services.push(name);
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Wrap the registered services with the transport layers.
    pub fn into_router(self, registry: &Registry, max_receive_message_size: usize) -> Router {
        let gate = QuotaGate::new(
            registry.quota_manager.clone(),
            registry.quota_dry_run,
            registry.metric_factory.clone(),
        );

        let mut router = self
            .router
            .layer(middleware::from_fn_with_state(gate, charge_quota));
        if max_receive_message_size > 0 {
            router = router.layer(DefaultBodyLimit::max(max_receive_message_size));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

/// Registers services on the RPC transport once the listener is bound.
///
/// Any error aborts startup.
pub trait ServiceRegistrar: Send + Sync {
    fn register(&self, transport: &mut RpcTransport, registry: &Registry) -> Result<(), RegistrationError>;
}

impl<F> ServiceRegistrar for F
where
    F: Fn(&mut RpcTransport, &Registry) -> Result<(), RegistrationError> + Send + Sync,
{
    fn register(&self, transport: &mut RpcTransport, registry: &Registry) -> Result<(), RegistrationError> {
        self(transport, registry)
    }
}
