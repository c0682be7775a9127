//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)              command-line flags
//!     → loader.rs (parse)             → args.rs (overrides)
//!                 ↘                  ↙
//!                   validation.rs (semantic checks)
//!                   → NodeConfig (validated, immutable)
//!                   → passed by value into the Node
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; no component re-reads global state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod args;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    DirectoryConfig, HealthConfig, HttpConfig, NodeConfig, ObservabilityConfig, QuotaConfig,
    RpcConfig, StorageConfig, TlsConfig, TreeGcConfig,
};
