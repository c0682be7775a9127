//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Binder::bind (listener.rs)
//!     → ListenerSet slot: Bound (kernel backlog only)
//!     → tls.rs (optional rustls config for the RPC listener)
//!     → ListenerSet::serve (axum-server task) → Serving
//!     → ListenerSet::close (graceful, bounded)
//! ```
//!
//! # Design Decisions
//! - Sockets are bound before the node announces itself
//! - TLS is optional; half a TLS config is a startup error
//! - The HTTP listener never carries TLS

pub mod listener;
pub mod tls;

pub use listener::{Binder, ListenerError, ListenerKind, ListenerSet, TcpBinder};
pub use tls::{load_tls_config, tls_paths, TlsError};
