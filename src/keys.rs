//! Key material collaborator interface.
//!
//! The node only carries a [`KeyProtoFactory`] into the capability bundle;
//! services call it when a request asks for new signing keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters of a key to be generated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum KeySpec {
    Ecdsa { curve: String },
    Rsa { bits: u32 },
    Ed25519,
}

/// Serialized private key material, as produced by a factory.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub format: String,
    pub der: Vec<u8>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key bytes.
        f.debug_struct("KeyMaterial")
            .field("format", &self.format)
            .field("len", &self.der.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key generation is not supported by this node ({0:?})")]
    Unsupported(KeySpec),

    #[error("key generation failed: {0}")]
    Generation(String),
}

#[async_trait]
pub trait KeyProtoFactory: Send + Sync {
    async fn new_key(&self, spec: &KeySpec) -> Result<KeyMaterial, KeyError>;
}

/// Factory for nodes that only accept externally provisioned keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeyGeneration;

#[async_trait]
impl KeyProtoFactory for NoKeyGeneration {
    async fn new_key(&self, spec: &KeySpec) -> Result<KeyMaterial, KeyError> {
        Err(KeyError::Unsupported(spec.clone()))
    }
}
