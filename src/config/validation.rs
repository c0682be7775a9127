//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Detect half-configured TLS
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::NodeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rpc.endpoint must not be empty")]
    EmptyRpcEndpoint,

    #[error("rpc.tls requires both cert_path and key_path (got only {present})")]
    PartialTls { present: &'static str },

    #[error("health.timeout_secs must be greater than zero")]
    ZeroHealthTimeout,

    #[error("tree_gc.min_run_interval_secs must be greater than zero when tree_gc is enabled")]
    ZeroSweepInterval,

    #[error("directory.{field} must not be empty when directory servers are configured")]
    EmptyServiceName { field: &'static str },

    #[error("directory.lease_ttl_secs must be greater than zero")]
    InvalidLeaseTtl,

    #[error("allowed_tree_types must not be empty")]
    NoAllowedTreeTypes,

    #[error("unknown storage provider {0:?}")]
    UnknownStorageProvider(String),

    #[error("unknown quota system {0:?}")]
    UnknownQuotaSystem(String),
}

const STORAGE_PROVIDERS: &[&str] = &["memory"];
const QUOTA_SYSTEMS: &[&str] = &["noop"];

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc.endpoint.trim().is_empty() {
        errors.push(ValidationError::EmptyRpcEndpoint);
    }

    if let Some(tls) = &config.rpc.tls {
        match (tls.cert_path.is_empty(), tls.key_path.is_empty()) {
            (false, true) => errors.push(ValidationError::PartialTls { present: "cert_path" }),
            (true, false) => errors.push(ValidationError::PartialTls { present: "key_path" }),
            _ => {}
        }
    }

    if config.health.timeout_secs == 0 {
        errors.push(ValidationError::ZeroHealthTimeout);
    }

    if config.tree_gc.enabled && config.tree_gc.min_run_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.directory.enabled() {
        if config.directory.rpc_service.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName { field: "rpc_service" });
        }
        if config.http.enabled() && config.directory.http_service.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName { field: "http_service" });
        }
        if config.directory.lease_ttl_secs <= 0 {
            errors.push(ValidationError::InvalidLeaseTtl);
        }
    }

    if config.allowed_tree_types.is_empty() {
        errors.push(ValidationError::NoAllowedTreeTypes);
    }

    if !STORAGE_PROVIDERS.contains(&config.storage.provider.as_str()) {
        errors.push(ValidationError::UnknownStorageProvider(config.storage.provider.clone()));
    }

    if !QUOTA_SYSTEMS.contains(&config.quota.system.as_str()) {
        errors.push(ValidationError::UnknownQuotaSystem(config.quota.system.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&NodeConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_problem() {
        let mut config = NodeConfig::default();
        config.rpc.endpoint = String::new();
        config.health.timeout_secs = 0;
        config.tree_gc.min_run_interval_secs = 0;
        config.allowed_tree_types.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyRpcEndpoint,
                ValidationError::ZeroHealthTimeout,
                ValidationError::ZeroSweepInterval,
                ValidationError::NoAllowedTreeTypes,
            ]
        );
    }

    #[test]
    fn tls_needs_both_paths() {
        let mut config = NodeConfig::default();
        config.rpc.tls = Some(TlsConfig {
            cert_path: "/etc/node/cert.pem".into(),
            key_path: String::new(),
        });
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::PartialTls { present: "cert_path" }])
        );

        // Both empty is plaintext, not an error.
        config.rpc.tls = Some(TlsConfig::default());
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn zero_interval_allowed_when_gc_disabled() {
        let mut config = NodeConfig::default();
        config.tree_gc.enabled = false;
        config.tree_gc.min_run_interval_secs = 0;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn service_names_checked_only_with_directory() {
        let mut config = NodeConfig::default();
        config.directory.rpc_service = String::new();
        assert_eq!(validate_config(&config), Ok(()));

        config.directory.servers = vec!["http://127.0.0.1:2379".into()];
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::EmptyServiceName { field: "rpc_service" }])
        );
    }

    #[test]
    fn unknown_providers_rejected() {
        let mut config = NodeConfig::default();
        config.storage.provider = "mysql".into();
        config.quota.system = "etcd".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("mysql"));
    }
}
