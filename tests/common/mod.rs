//! Shared fakes for node integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time;

use log_node::directory::{Directory, DirectoryError, Endpoint, Registration};
use log_node::health::{HealthProbe, ProbeError};
use log_node::keys::NoKeyGeneration;
use log_node::net::{Binder, TcpBinder};
use log_node::observability::MetricFactory;
use log_node::quota::NoopQuotaManager;
use log_node::storage::MemoryStorageProvider;
use log_node::{NodeConfig, NodeDeps, NodePhase, NodeState};

/// Config bound to ephemeral loopback ports with short timeouts.
pub fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.rpc.endpoint = "127.0.0.1:0".to_string();
    config.rpc.shutdown_grace_secs = 1;
    config.http.endpoint = "127.0.0.1:0".to_string();
    config.health.timeout_secs = 1;
    config.directory.release_timeout_secs = 1;
    config.tree_gc.enabled = false;
    config
}

pub fn deps(storage: Arc<MemoryStorageProvider>, directory: Arc<dyn Directory>) -> NodeDeps {
    NodeDeps {
        storage,
        directory,
        quota_manager: Arc::new(NoopQuotaManager),
        key_factory: Arc::new(NoKeyGeneration),
        metrics: MetricFactory::detached("test"),
    }
}

/// Wait until the node reports `phase`.
pub async fn wait_for_phase(state: &mut watch::Receiver<NodeState>, phase: NodePhase) -> NodeState {
    time::timeout(Duration::from_secs(5), state.wait_for(|s| s.phase == phase))
        .await
        .expect("timed out waiting for node phase")
        .expect("node state channel closed")
        .clone()
}

/// Probe with a fixed answer.
pub struct StaticProbe(pub bool);

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        if self.0 {
            Ok(())
        } else {
            Err("database unreachable".into())
        }
    }
}

/// Probe that never answers.
pub struct HangingProbe;

#[async_trait]
impl HealthProbe for HangingProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Real TCP binder that counts bind attempts.
#[derive(Default)]
pub struct CountingBinder {
    binds: AtomicUsize,
}

impl CountingBinder {
    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Binder for CountingBinder {
    async fn bind(&self, address: &str) -> io::Result<std::net::TcpListener> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        TcpBinder.bind(address).await
    }
}

/// Directory that logs announce and deregister calls in order.
///
/// A deregistration also records whether the announced address still
/// accepted connections at that moment.
#[derive(Clone, Default)]
pub struct RecordingDirectory {
    events: Arc<Mutex<Vec<String>>>,
    unreachable: bool,
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Directory for RecordingDirectory {
    async fn announce(&self, endpoint: &Endpoint) -> Result<Registration, DirectoryError> {
        if self.unreachable {
            return Err(DirectoryError::Unreachable("test directory down".into()));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("announce {}", endpoint.service));

        let events = Arc::clone(&self.events);
        let announced = endpoint.clone();
        Ok(Registration::new(endpoint.clone(), move || async move {
            let open = TcpStream::connect(&announced.address).await.is_ok();
            events
                .lock()
                .unwrap()
                .push(format!("deregister {} open={}", announced.service, open));
            Ok(())
        }))
    }
}
