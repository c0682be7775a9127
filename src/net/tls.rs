//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS needs both a certificate and a key; only the {present} was given")]
    Incomplete { present: &'static str },

    #[error("cannot read {kind} file {path:?}: {source}")]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS material: {0}")]
    Invalid(#[source] io::Error),
}

/// Resolve the configured certificate and key paths.
///
/// `None` (or both paths empty) means plaintext. Exactly one path set is
/// an error.
pub fn tls_paths(config: Option<&TlsConfig>) -> Result<Option<(PathBuf, PathBuf)>, TlsError> {
    let Some(tls) = config else {
        return Ok(None);
    };
    match (tls.cert_path.trim().is_empty(), tls.key_path.trim().is_empty()) {
        (true, true) => Ok(None),
        (false, true) => Err(TlsError::Incomplete { present: "certificate" }),
        (true, false) => Err(TlsError::Incomplete { present: "key" }),
        (false, false) => Ok(Some((PathBuf::from(&tls.cert_path), PathBuf::from(&tls.key_path)))),
    }
}

/// Load and check a PEM certificate chain and private key.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let cert_pem = read_pem("certificate", cert_path).await?;
    let key_pem = read_pem("key", key_path).await?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Invalid)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }
    if rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(TlsError::Invalid)?
        .is_none()
    {
        return Err(TlsError::NoPrivateKey(key_path.to_path_buf()));
    }

    let config = RustlsConfig::from_pem(cert_pem, key_pem)
        .await
        .map_err(TlsError::Invalid)?;
    tracing::info!(cert = ?cert_path, chain_len = certs.len(), "TLS credentials loaded");
    Ok(config)
}

async fn read_pem(kind: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })
}
