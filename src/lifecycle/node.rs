//! Node orchestration.
//!
//! # States
//! ```text
//! Init → HealthGate → Starting → Serving → Draining → Stopped
//!            │            │
//!            └────────────┴──→ Failed
//! ```
//!
//! # Startup
//! 0. Reject a configuration that fails validation before touching anything.
//! 1. One health probe, bounded by the configured deadline. No socket is
//!    touched unless it passes.
//! 2. Bind the RPC socket (fatal on failure), then the HTTP socket
//!    (degraded on failure).
//! 3. Announce each bound address. Every announcement lands on the release
//!    stack the moment it succeeds.
//! 4. Let the registrar add services, then start serving.
//! 5. Start the GC scheduler.
//!
//! # Teardown
//! Runs after the shutdown signal, and after any fatal startup error:
//! stop GC → deregister (newest first) → close listeners → close storage.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::NodeConfig;
use crate::directory::{Directory, DirectoryError, Endpoint};
use crate::extension::Registry;
use crate::gc::{DeletedTreeGc, GcHandle, GcScheduler, GcStatus, IntervalSource, JitteredInterval};
use crate::health::{HealthError, HealthMonitor, HealthProbe, StorageProbe};
use crate::http;
use crate::keys::KeyProtoFactory;
use crate::lifecycle::release::{ReleaseError, ReleaseStack};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::{self, Binder, ListenerError, ListenerKind, ListenerSet, TcpBinder, TlsError};
use crate::observability::MetricFactory;
use crate::quota::QuotaManager;
use crate::rpc::{RegistrationError, RpcTransport, ServiceRegistrar};
use crate::storage::{StorageError, StorageProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Init,
    HealthGate,
    Starting,
    Serving,
    Draining,
    Stopped,
    Failed,
}

/// Observable node state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub phase: NodePhase,
    pub rpc_addr: Option<SocketAddr>,
    pub http_addr: Option<SocketAddr>,
}

impl NodeState {
    fn initial() -> Self {
        Self {
            phase: NodePhase::Init,
            rpc_addr: None,
            http_addr: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error("dependencies not healthy: {0}")]
    Unhealthy(#[source] HealthError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("service registration failed: {0}")]
    Registration(#[source] RegistrationError),

    #[error("failed to announce {endpoint}: {source}")]
    Announce {
        endpoint: Endpoint,
        #[source]
        source: DirectoryError,
    },

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error("failed to close storage: {0}")]
    StorageClose(#[source] StorageError),
}

impl NodeError {
    /// Whether this error aborted startup, as opposed to surfacing during
    /// teardown.
    pub fn is_fatal_startup(&self) -> bool {
        match self {
            NodeError::Config(_)
            | NodeError::Unhealthy(_)
            | NodeError::Tls(_)
            | NodeError::Registration(_)
            | NodeError::Announce { .. } => true,
            NodeError::Listener(e) => matches!(e, ListenerError::Bind { .. }),
            NodeError::Release(_) | NodeError::StorageClose(_) => false,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// External collaborators the node drives.
pub struct NodeDeps {
    pub storage: Arc<dyn StorageProvider>,
    pub directory: Arc<dyn Directory>,
    pub quota_manager: Arc<dyn QuotaManager>,
    pub key_factory: Arc<dyn KeyProtoFactory>,
    pub metrics: MetricFactory,
}

pub struct Node {
    config: NodeConfig,
    deps: NodeDeps,
    registrar: Box<dyn ServiceRegistrar>,
    probe: Option<Arc<dyn HealthProbe>>,
    binder: Arc<dyn Binder>,
    intervals: Box<dyn IntervalSource>,
    gc_status: GcStatus,
    state: watch::Sender<NodeState>,
}

/// Everything acquired so far, in the order teardown needs it.
#[derive(Default)]
struct Started {
    gc: Option<GcHandle>,
    announcements: ReleaseStack,
    listeners: ListenerSet,
}

impl Node {
    pub fn new(config: NodeConfig, deps: NodeDeps, registrar: impl ServiceRegistrar + 'static) -> Self {
        let (state, _) = watch::channel(NodeState::initial());
        Self {
            config,
            deps,
            registrar: Box::new(registrar),
            probe: None,
            binder: Arc::new(TcpBinder),
            intervals: Box::new(JitteredInterval::from_entropy()),
            gc_status: GcStatus::new(),
            state,
        }
    }

    /// Replace the default storage probe used by the health gate.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = binder;
        self
    }

    /// Replace the source of GC sweep intervals.
    pub fn with_intervals(mut self, intervals: Box<dyn IntervalSource>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn state(&self) -> watch::Receiver<NodeState> {
        self.state.subscribe()
    }

    pub fn gc_status(&self) -> GcStatus {
        self.gc_status.clone()
    }

    /// Run until `shutdown` fires, then drain.
    ///
    /// Returns the fatal startup error if startup was aborted, otherwise
    /// the first error hit while draining.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), NodeError> {
        let Node {
            config,
            deps,
            registrar,
            probe,
            binder,
            intervals,
            gc_status,
            state,
        } = self;

        let probe =
            probe.unwrap_or_else(|| Arc::new(StorageProbe::new(deps.storage.admin_storage())));
        let monitor = Arc::new(HealthMonitor::new(
            probe,
            config.health.deadline(),
            deps.metrics.clone(),
        ));
        let mut started = Started::default();

        if let Err(errors) = validate_config(&config) {
            tracing::error!(errors = errors.len(), "Configuration rejected, not starting");
            return fail(&state, NodeError::Config(errors), started, &config, &deps).await;
        }

        set_phase(&state, NodePhase::HealthGate);
        tracing::info!(deadline = ?monitor.deadline(), "Checking dependency health");
        if let Err(e) = monitor.check().await {
            tracing::error!(error = %e, "Health gate failed, not starting");
            return fail(&state, NodeError::Unhealthy(e), started, &config, &deps).await;
        }

        set_phase(&state, NodePhase::Starting);
        let startup = Startup {
            config: &config,
            deps: &deps,
            binder: binder.as_ref(),
            registrar: registrar.as_ref(),
            state: &state,
            monitor: &monitor,
            gc_status: &gc_status,
        };
        if let Err(e) = startup.run(&mut started, intervals).await {
            tracing::error!(error = %e, "Startup failed");
            return fail(&state, e, started, &config, &deps).await;
        }

        set_phase(&state, NodePhase::Serving);
        tracing::info!("Node serving");

        shutdown.recv().await;

        set_phase(&state, NodePhase::Draining);
        tracing::info!("Node draining");
        let errors = teardown(started, &config, &deps).await;
        set_phase(&state, NodePhase::Stopped);

        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => {
                tracing::info!("Node stopped");
                Ok(())
            }
        }
    }
}

struct Startup<'a> {
    config: &'a NodeConfig,
    deps: &'a NodeDeps,
    binder: &'a dyn Binder,
    registrar: &'a dyn ServiceRegistrar,
    state: &'a watch::Sender<NodeState>,
    monitor: &'a Arc<HealthMonitor>,
    gc_status: &'a GcStatus,
}

impl Startup<'_> {
    async fn run(&self, started: &mut Started, intervals: Box<dyn IntervalSource>) -> Result<(), NodeError> {
        let tls = match net::tls_paths(self.config.rpc.tls.as_ref())? {
            Some((cert, key)) => Some(net::load_tls_config(&cert, &key).await?),
            None => {
                tracing::warn!("RPC listener is plaintext; no TLS certificate configured");
                None
            }
        };

        let rpc_addr = started
            .listeners
            .bind(ListenerKind::Rpc, self.binder, &self.config.rpc.endpoint)
            .await?;
        self.state.send_modify(|s| s.rpc_addr = Some(rpc_addr));

        if self.config.http.enabled() {
            match started
                .listeners
                .bind(ListenerKind::Http, self.binder, &self.config.http.endpoint)
                .await
            {
                Ok(addr) => self.state.send_modify(|s| s.http_addr = Some(addr)),
                Err(e) => tracing::warn!(error = %e, "HTTP listener unavailable, continuing without it"),
            }
        } else {
            tracing::info!("HTTP endpoint not configured");
        }

        let directory = &self.config.directory;
        self.announce(started, Endpoint::new(&directory.rpc_service, rpc_addr.to_string()))
            .await?;
        if let Some(http_addr) = started.listeners.local_addr(ListenerKind::Http) {
            self.announce(started, Endpoint::new(&directory.http_service, http_addr.to_string()))
                .await?;
        }

        let registry = Registry {
            admin_storage: self.deps.storage.admin_storage(),
            log_storage: self.deps.storage.log_storage(),
            quota_manager: self.deps.quota_manager.clone(),
            metric_factory: self.deps.metrics.clone(),
            key_factory: self.deps.key_factory.clone(),
            allowed_tree_types: self.config.allowed_tree_types.clone(),
            quota_dry_run: self.config.quota.dry_run,
        };
        let mut transport = RpcTransport::new(rpc_addr);
        self.registrar
            .register(&mut transport, &registry)
            .map_err(NodeError::Registration)?;
        tracing::info!(services = ?transport.services(), "RPC services registered");

        let rpc_app = transport.into_router(&registry, self.config.rpc.max_receive_message_size);
        started.listeners.serve(ListenerKind::Rpc, rpc_app, tls);

        if started.listeners.is_bound(ListenerKind::Http) {
            let http_state = http::AppState::new(
                Arc::clone(self.monitor),
                self.deps.metrics.clone(),
                self.gc_status.clone(),
            );
            started
                .listeners
                .serve(ListenerKind::Http, http::build_router(http_state), None);
        }

        let gc = DeletedTreeGc::new(registry.admin_storage.clone(), self.config.tree_gc.delete_threshold());
        let scheduler = GcScheduler::new(
            gc,
            self.config.tree_gc.clone(),
            intervals,
            self.gc_status.clone(),
            self.deps.metrics.clone(),
        );
        started.gc = Some(scheduler.spawn());

        Ok(())
    }

    async fn announce(&self, started: &mut Started, endpoint: Endpoint) -> Result<(), NodeError> {
        let registration = self
            .deps
            .directory
            .announce(&endpoint)
            .await
            .map_err(|source| NodeError::Announce {
                endpoint: endpoint.clone(),
                source,
            })?;
        started
            .announcements
            .push(format!("announcement {endpoint}"), move || registration.deregister());
        Ok(())
    }
}

fn set_phase(state: &watch::Sender<NodeState>, phase: NodePhase) {
    state.send_modify(|s| s.phase = phase);
    tracing::debug!(phase = ?phase, "Node phase changed");
}

async fn fail(
    state: &watch::Sender<NodeState>,
    error: NodeError,
    started: Started,
    config: &NodeConfig,
    deps: &NodeDeps,
) -> Result<(), NodeError> {
    teardown(started, config, deps).await;
    set_phase(state, NodePhase::Failed);
    Err(error)
}

/// Release everything in `started`, then the storage provider. Errors are
/// logged where they occur and collected in order.
async fn teardown(started: Started, config: &NodeConfig, deps: &NodeDeps) -> Vec<NodeError> {
    let mut errors = Vec::new();

    if let Some(gc) = started.gc {
        gc.stop().await;
    }

    let released = started
        .announcements
        .unwind(config.directory.release_timeout())
        .await;
    errors.extend(released.into_iter().map(NodeError::Release));

    let closed = started.listeners.close(config.rpc.shutdown_grace()).await;
    errors.extend(closed.into_iter().map(NodeError::Listener));

    if let Err(e) = deps.storage.close().await {
        tracing::warn!(error = %e, "Failed to close storage");
        errors.push(NodeError::StorageClose(e));
    }

    errors
}
