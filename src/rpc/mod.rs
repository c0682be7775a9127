//! RPC transport subsystem.
//!
//! # Data Flow
//! ```text
//! bound RPC socket → RpcTransport::new(local_addr)
//!     → ServiceRegistrar::register (services merge their routers)
//!     → RpcTransport::into_router (quota, body limit, request id, trace)
//!     → ListenerSet::serve
//! ```

pub mod quota;
pub mod transport;

pub use transport::{RegistrationError, RpcTransport, ServiceRegistrar};
