//! Command-line flags.
//!
//! A config file provides the base; any flag given on the command line
//! overrides the corresponding file value.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{NodeConfig, TlsConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "log-node")]
#[command(about = "Verifiable log RPC server node", long_about = None)]
pub struct NodeArgs {
    /// Config file (TOML); its values can be overridden by flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Endpoint for RPC requests (host:port).
    #[arg(long)]
    pub rpc_endpoint: Option<String>,

    /// Endpoint for HTTP metrics (host:port, empty means disabled).
    #[arg(long)]
    pub http_endpoint: Option<String>,

    /// Timeout used during healthz checks, in seconds.
    #[arg(long)]
    pub healthz_timeout_secs: Option<u64>,

    /// Path to the TLS server certificate.
    #[arg(long)]
    pub tls_cert_file: Option<String>,

    /// Path to the TLS server key.
    #[arg(long)]
    pub tls_key_file: Option<String>,

    /// Comma-separated etcd endpoints used for announcements.
    #[arg(long, value_delimiter = ',')]
    pub etcd_servers: Option<Vec<String>>,

    /// Service name to announce the RPC endpoint under.
    #[arg(long)]
    pub etcd_service: Option<String>,

    /// Service name to announce the HTTP endpoint under.
    #[arg(long)]
    pub etcd_http_service: Option<String>,

    /// If true no requests are blocked due to lack of tokens.
    #[arg(long)]
    pub quota_dry_run: Option<bool>,

    /// If true, tree garbage collection (hard-deletion) is periodically performed.
    #[arg(long)]
    pub tree_gc: Option<bool>,

    /// Minimum period a tree has to remain deleted before being hard-deleted, in seconds.
    #[arg(long)]
    pub tree_delete_threshold_secs: Option<u64>,

    /// Minimum interval between tree garbage collection sweeps, in seconds.
    #[arg(long)]
    pub tree_delete_min_run_interval_secs: Option<u64>,

    /// Maximum receive message size for the RPC transport (0 = default).
    #[arg(long)]
    pub max_receive_message_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl NodeArgs {
    /// Build the final configuration: file (or defaults), then flags, then validation.
    pub fn resolve(&self) -> Result<NodeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => NodeConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut NodeConfig) {
        if let Some(endpoint) = &self.rpc_endpoint {
            config.rpc.endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &self.http_endpoint {
            config.http.endpoint = endpoint.clone();
        }
        if let Some(secs) = self.healthz_timeout_secs {
            config.health.timeout_secs = secs;
        }
        if self.tls_cert_file.is_some() || self.tls_key_file.is_some() {
            let tls = config.rpc.tls.get_or_insert_with(TlsConfig::default);
            if let Some(cert) = &self.tls_cert_file {
                tls.cert_path = cert.clone();
            }
            if let Some(key) = &self.tls_key_file {
                tls.key_path = key.clone();
            }
        }
        if let Some(servers) = &self.etcd_servers {
            config.directory.servers = servers.iter().filter(|s| !s.is_empty()).cloned().collect();
        }
        if let Some(service) = &self.etcd_service {
            config.directory.rpc_service = service.clone();
        }
        if let Some(service) = &self.etcd_http_service {
            config.directory.http_service = service.clone();
        }
        if let Some(dry_run) = self.quota_dry_run {
            config.quota.dry_run = dry_run;
        }
        if let Some(enabled) = self.tree_gc {
            config.tree_gc.enabled = enabled;
        }
        if let Some(secs) = self.tree_delete_threshold_secs {
            config.tree_gc.delete_threshold_secs = secs;
        }
        if let Some(secs) = self.tree_delete_min_run_interval_secs {
            config.tree_gc.min_run_interval_secs = secs;
        }
        if let Some(size) = self.max_receive_message_size {
            config.rpc.max_receive_message_size = size;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}
