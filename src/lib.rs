//! Log node: bootstrap and lifecycle for a verifiable-log RPC server.

pub mod admin;
pub mod config;
pub mod directory;
pub mod extension;
pub mod gc;
pub mod health;
pub mod http;
pub mod keys;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod quota;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use extension::Registry;
pub use lifecycle::{Node, NodeDeps, NodeError, NodePhase, NodeState, Shutdown};
