//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the node.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::storage::TreeType;

/// Default period a tree must stay soft-deleted before it is hard-deleted.
pub const DEFAULT_TREE_DELETE_THRESHOLD_SECS: u64 = 7 * 24 * 60 * 60;

/// Default lower bound of the tree GC sweep interval.
pub const DEFAULT_TREE_DELETE_MIN_INTERVAL_SECS: u64 = 4 * 60 * 60;

/// Root configuration for a log node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// RPC transport settings.
    pub rpc: RpcConfig,

    /// Secondary HTTP transport (health, metrics, debug).
    pub http: HttpConfig,

    /// Startup health gate.
    pub health: HealthConfig,

    /// Service directory announcements.
    pub directory: DirectoryConfig,

    /// Quota settings passed through to RPC services.
    pub quota: QuotaConfig,

    /// Deleted tree garbage collection.
    pub tree_gc: TreeGcConfig,

    /// Tree types the registered services may accept.
    pub allowed_tree_types: Vec<TreeType>,

    /// Storage provider selection.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            http: HttpConfig::default(),
            health: HealthConfig::default(),
            directory: DirectoryConfig::default(),
            quota: QuotaConfig::default(),
            tree_gc: TreeGcConfig::default(),
            allowed_tree_types: vec![TreeType::Log, TreeType::PreorderedLog],
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// RPC transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint for RPC requests (host:port).
    pub endpoint: String,

    /// Optional TLS configuration. Absent means plaintext.
    pub tls: Option<TlsConfig>,

    /// Maximum inbound request body in bytes (0 = transport default).
    pub max_receive_message_size: usize,

    /// Time allowed for in-flight requests to finish on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:8090".to_string(),
            tls: None,
            max_receive_message_size: 0,
            shutdown_grace_secs: 10,
        }
    }
}

impl RpcConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// TLS configuration for the RPC listener.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Secondary HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Endpoint for HTTP metrics/health (host:port, empty means disabled).
    pub endpoint: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:8091".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

/// Startup health gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Deadline for a single health probe in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl HealthConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Service directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// etcd endpoints. Empty means announcements are skipped.
    pub servers: Vec<String>,

    /// Service name the RPC endpoint is announced under.
    pub rpc_service: String,

    /// Service name the HTTP endpoint is announced under.
    pub http_service: String,

    /// TTL of the lease backing each announcement.
    pub lease_ttl_secs: i64,

    /// Upper bound on a single deregistration during shutdown.
    pub release_timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            rpc_service: "log-server".to_string(),
            http_service: "log-server-http".to_string(),
            lease_ttl_secs: 30,
            release_timeout_secs: 5,
        }
    }
}

impl DirectoryConfig {
    pub fn enabled(&self) -> bool {
        !self.servers.is_empty()
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_secs(self.release_timeout_secs)
    }
}

/// Quota configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Quota system name.
    pub system: String,

    /// If true no requests are blocked due to lack of tokens.
    pub dry_run: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            system: "noop".to_string(),
            dry_run: false,
        }
    }
}

/// Tree garbage collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeGcConfig {
    /// If true, hard-deletion sweeps run periodically.
    pub enabled: bool,

    /// Minimum period a tree has to remain deleted before being hard-deleted.
    pub delete_threshold_secs: u64,

    /// Minimum interval between sweeps. Actual runs happen randomly
    /// between [min, 2*min).
    pub min_run_interval_secs: u64,
}

impl Default for TreeGcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delete_threshold_secs: DEFAULT_TREE_DELETE_THRESHOLD_SECS,
            min_run_interval_secs: DEFAULT_TREE_DELETE_MIN_INTERVAL_SECS,
        }
    }
}

impl TreeGcConfig {
    pub fn delete_threshold(&self) -> Duration {
        Duration::from_secs(self.delete_threshold_secs)
    }

    pub fn min_run_interval(&self) -> Duration {
        Duration::from_secs(self.min_run_interval_secs)
    }
}

/// Storage provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Provider name.
    pub provider: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prefix applied to every metric name.
    pub stats_prefix: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_prefix: "log".to_string(),
        }
    }
}
