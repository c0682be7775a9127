//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (node.rs):
//!     Init → HealthGate → Starting (bind, announce, register) → Serving
//!
//! Shutdown (node.rs, release.rs):
//!     Signal → Draining → stop GC → deregister → close listeners
//!            → close storage → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: health gate first, listeners before announcements
//! - Ordered shutdown: the node leaves the directory while it still accepts
//! - Every teardown step is bounded and best-effort
//! - A fatal startup failure runs the same teardown

pub mod node;
pub mod release;
pub mod shutdown;
pub mod signals;

pub use node::{Node, NodeDeps, NodeError, NodePhase, NodeState};
pub use release::{ReleaseError, ReleaseStack};
pub use shutdown::{Shutdown, ShutdownSignal};
