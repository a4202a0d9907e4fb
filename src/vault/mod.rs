//! Credential vault lookups
//!
//! The daemon only asks whether network credentials exist for a share; it
//! never reads secret material. Any lookup failure is treated as "no
//! credentials" so a share is never mounted without a confirmed record.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bookmarks::ShareEntry;

pub mod mock;
mod secret_service;

pub use secret_service::SecretServiceVault;

/// Error types for vault lookups
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Credential lookup for {key} failed: {message}")]
    Query {
        key: CredentialLookupKey,
        message: String,
    },
}

impl VaultError {
    /// Create a query error
    pub fn query(key: &CredentialLookupKey, message: impl Into<String>) -> Self {
        Self::Query {
            key: key.clone(),
            message: message.into(),
        }
    }
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// The (protocol, host) pair credentials are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialLookupKey {
    pub protocol: String,
    pub host: String,
}

impl CredentialLookupKey {
    /// Derive the lookup key for a share
    pub fn for_share(share: &ShareEntry) -> Self {
        Self {
            protocol: share.protocol().to_string(),
            host: share.host().to_string(),
        }
    }
}

impl fmt::Display for CredentialLookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.host)
    }
}

/// A store that can count network-credential records.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Number of stored network-credential records matching the key.
    async fn count_network_credentials(&self, key: &CredentialLookupKey) -> VaultResult<usize>;
}

/// Answers whether a share has stored credentials.
#[derive(Clone)]
pub struct CredentialOracle {
    vault: Arc<dyn CredentialVault>,
}

impl CredentialOracle {
    /// Create an oracle backed by the given vault
    pub fn new(vault: Arc<dyn CredentialVault>) -> Self {
        Self { vault }
    }

    /// True only when at least one record matches the share's (protocol, host).
    pub async fn has_credentials(&self, share: &ShareEntry) -> bool {
        let key = CredentialLookupKey::for_share(share);
        match self.vault.count_network_credentials(&key).await {
            Ok(count) => {
                debug!(share = %share, count, "Credential lookup finished");
                count > 0
            }
            Err(e) => {
                warn!(share = %share, "{}", e);
                false
            }
        }
    }
}
