//! Listener binding and serving.
//!
//! # Responsibilities
//! - Bind the RPC and HTTP sockets before anything is announced
//! - Hand bound sockets to axum-server once services are registered
//! - Close everything within a grace period on teardown
//!
//! A socket moves through `Bound` (accepting into the backlog, nothing
//! served yet) and `Serving`. Dropping a `Bound` socket closes it.

use async_trait::async_trait;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;

/// Extra time allowed past the grace period for a listener task to exit.
const CLOSE_SLACK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Rpc,
    Http,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Rpc => f.write_str("rpc"),
            ListenerKind::Http => f.write_str("http"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {kind} listener on {address}: {source}")]
    Bind {
        kind: ListenerKind,
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{kind} listener failed: {source}")]
    Serve {
        kind: ListenerKind,
        #[source]
        source: io::Error,
    },

    #[error("{kind} listener did not stop within {after:?}")]
    CloseTimeout { kind: ListenerKind, after: Duration },

    #[error("{kind} listener task panicked")]
    Panicked { kind: ListenerKind },
}

/// Opens listening sockets. Swappable so tests can observe binds.
#[async_trait]
pub trait Binder: Send + Sync {
    async fn bind(&self, address: &str) -> io::Result<std::net::TcpListener>;
}

/// Binds real TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpBinder;

#[async_trait]
impl Binder for TcpBinder {
    async fn bind(&self, address: &str) -> io::Result<std::net::TcpListener> {
        let listener = tokio::net::TcpListener::bind(address).await?;
        listener.into_std()
    }
}

struct Bound {
    socket: std::net::TcpListener,
    local_addr: SocketAddr,
}

struct Serving {
    local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
}

enum Slot {
    Bound(Bound),
    Serving(Serving),
}

impl Slot {
    fn local_addr(&self) -> SocketAddr {
        match self {
            Slot::Bound(b) => b.local_addr,
            Slot::Serving(s) => s.local_addr,
        }
    }
}

/// The node's RPC and HTTP listeners.
#[derive(Default)]
pub struct ListenerSet {
    rpc: Option<Slot>,
    http: Option<Slot>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: ListenerKind) -> &mut Option<Slot> {
        match kind {
            ListenerKind::Rpc => &mut self.rpc,
            ListenerKind::Http => &mut self.http,
        }
    }

    /// Bind `kind` on `address`, replacing nothing: binding twice is a bug.
    pub async fn bind(
        &mut self,
        kind: ListenerKind,
        binder: &dyn Binder,
        address: &str,
    ) -> Result<SocketAddr, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            kind,
            address: address.to_string(),
            source,
        };

        let socket = binder.bind(address).await.map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        tracing::info!(listener = %kind, address = %local_addr, "Listener bound");
        *self.slot(kind) = Some(Slot::Bound(Bound { socket, local_addr }));
        Ok(local_addr)
    }

    pub fn local_addr(&self, kind: ListenerKind) -> Option<SocketAddr> {
        match kind {
            ListenerKind::Rpc => self.rpc.as_ref().map(Slot::local_addr),
            ListenerKind::Http => self.http.as_ref().map(Slot::local_addr),
        }
    }

    pub fn is_bound(&self, kind: ListenerKind) -> bool {
        self.local_addr(kind).is_some()
    }

    /// Start serving `app` on a bound listener. Returns false when `kind`
    /// was never bound.
    pub fn serve(&mut self, kind: ListenerKind, app: Router, tls: Option<RustlsConfig>) -> bool {
        let slot = self.slot(kind);
        let bound = match slot.take() {
            Some(Slot::Bound(bound)) => bound,
            other => {
                *slot = other;
                return false;
            }
        };

        let handle = Handle::new();
        let service = app.into_make_service();
        let task = match tls {
            Some(tls) => {
                let server = axum_server::from_tcp_rustls(bound.socket, tls).handle(handle.clone());
                tokio::spawn(async move { server.serve(service).await })
            }
            None => {
                let server = axum_server::from_tcp(bound.socket).handle(handle.clone());
                tokio::spawn(async move { server.serve(service).await })
            }
        };

        tracing::info!(listener = %kind, address = %bound.local_addr, "Listener serving");
        *slot = Some(Slot::Serving(Serving {
            local_addr: bound.local_addr,
            handle,
            task,
        }));
        true
    }

    /// Stop both listeners, RPC first. Serving listeners get `grace` to
    /// finish in-flight requests.
    pub async fn close(self, grace: Duration) -> Vec<ListenerError> {
        let mut errors = Vec::new();
        for (kind, slot) in [(ListenerKind::Rpc, self.rpc), (ListenerKind::Http, self.http)] {
            let result = match slot {
                None => continue,
                Some(Slot::Bound(bound)) => {
                    drop(bound.socket);
                    Ok(())
                }
                Some(Slot::Serving(serving)) => close_serving(kind, serving, grace).await,
            };
            match result {
                Ok(()) => tracing::info!(listener = %kind, "Listener closed"),
                Err(e) => {
                    tracing::warn!(listener = %kind, error = %e, "Listener close failed");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

async fn close_serving(kind: ListenerKind, serving: Serving, grace: Duration) -> Result<(), ListenerError> {
    serving.handle.graceful_shutdown(Some(grace));
    let mut task = serving.task;
    match time::timeout(grace + CLOSE_SLACK, &mut task).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(source))) => Err(ListenerError::Serve { kind, source }),
        Ok(Err(_)) => Err(ListenerError::Panicked { kind }),
        Err(_) => {
            task.abort();
            Err(ListenerError::CloseTimeout {
                kind,
                after: grace + CLOSE_SLACK,
            })
        }
    }
}
